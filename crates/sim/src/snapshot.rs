// oneOS - Bare-metal UART bring-up
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::Access;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SimSnapshot {
    pub peripherals: BTreeMap<String, serde_json::Value>,
    pub accesses: Vec<Access>,
    pub spins: usize,
}

#[cfg(test)]
mod tests {
    use crate::SimBoard;
    use oneos_mmio::RegisterBus;

    #[test]
    fn test_snapshot_serializes_models_and_log() {
        let board = SimBoard::new(0x2020_0000, 0x2020_1000).unwrap();
        board.write32(0x2020_1024, 1);
        board.spin_hint();

        let json = serde_json::to_value(board.snapshot()).unwrap();

        assert_eq!(json["peripherals"]["uart0"]["ibrd"], 1);
        assert_eq!(json["accesses"][0]["kind"], "write");
        assert_eq!(json["accesses"][0]["addr"], 0x2020_1024);
        assert_eq!(json["accesses"][1]["kind"], "spin");
        assert_eq!(json["spins"], 1);
    }
}
