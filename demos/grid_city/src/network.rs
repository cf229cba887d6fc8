//! Synthetic street grid for the demo.
//!
//! A `SIDE × SIDE` block grid with 80 m blocks.  Avenues (every fourth
//! row and column) are 6 m wide, side streets 2.5 m, and one diagonal
//! alley of 1.5 m cuts through the centre.  The grid is emitted as a
//! provider-style [`GraphPayload`] with external ids `1000 + k`, the same
//! shape a network service would hand over.

use ev_network::{EdgeRecord, GraphPayload, NodeRecord};

pub const SIDE:    u64 = 12;
const BLOCK_M:     f64 = 80.0;
const AVENUE_M:    f64 = 6.0;
const STREET_M:    f64 = 2.5;
const ALLEY_M:     f64 = 1.5;

fn external(r: u64, c: u64) -> u64 {
    1_000 + r * SIDE + c
}

fn street(from: u64, to: u64, length_m: f64, width_m: f64) -> EdgeRecord {
    EdgeRecord {
        from,
        to,
        length_m,
        width_m:      Some(width_m),
        one_way:      None,
        capacity:     None,
        service_rate: None,
    }
}

pub fn build_payload() -> GraphPayload {
    let mut nodes = Vec::with_capacity((SIDE * SIDE) as usize);
    for r in 0..SIDE {
        for c in 0..SIDE {
            nodes.push(NodeRecord { id: external(r, c), x: c as f64 * BLOCK_M, y: r as f64 * BLOCK_M });
        }
    }

    let width = |line: u64| if line % 4 == 0 { AVENUE_M } else { STREET_M };
    let mut edges = Vec::new();
    for r in 0..SIDE {
        for c in 0..SIDE {
            if c + 1 < SIDE {
                edges.push(street(external(r, c), external(r, c + 1), BLOCK_M, width(r)));
            }
            if r + 1 < SIDE {
                edges.push(street(external(r, c), external(r + 1, c), BLOCK_M, width(c)));
            }
        }
    }

    // Diagonal alley through the centre blocks.
    let diagonal = BLOCK_M * std::f64::consts::SQRT_2;
    for k in SIDE / 3..2 * SIDE / 3 {
        edges.push(street(external(k, k), external(k + 1, k + 1), diagonal, ALLEY_M));
    }

    GraphPayload { nodes, edges }
}
