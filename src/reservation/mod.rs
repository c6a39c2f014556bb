// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Kubelet resource reservation formula.
//!
//! The tiers follow the formula GKE publishes for its node pools:
//!
//! | CPU                     | reserved |
//! |-------------------------|----------|
//! | first core              | 6%       |
//! | second core             | 1%       |
//! | cores 3 and 4           | 0.5%     |
//! | every core above 4      | 0.25%    |
//!
//! | Memory                  | reserved |
//! |-------------------------|----------|
//! | below 1 GiB             | 255 MiB  |
//! | first 4 GiB             | 25%      |
//! | next 4 GiB (up to 8)    | 20%      |
//! | next 8 GiB (up to 16)   | 10%      |
//! | next 112 GiB (to 128)   | 6%       |
//! | above 128 GiB           | 2%       |
//!
//! CPU tiers are threshold checks on the whole core count while memory tiers
//! are clamped byte ranges. All arithmetic is integer and truncating.

use crate::api::core::{Quantity, QuantityError};
use crate::api::gardener::{KubeletConfigReserved, MachineType};

const KIB: i64 = 1024;
const MIB: i64 = 1024 * KIB;
const GIB: i64 = 1024 * MIB;

/// PIDs reserved on every node, independent of its size.
pub const RESERVED_PIDS: i64 = 20_000;

/// Memory reserved on machines with less than 1 GiB.
pub const SMALL_MACHINE_MEMORY_RESERVATION: i64 = 255 * MIB;

/// Capacity of one machine type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MachineCapacity {
    pub cpu_milli: i64,
    pub memory_bytes: i64,
}

impl MachineCapacity {
    pub fn new(cpu_milli: i64, memory_bytes: i64) -> Self {
        Self {
            cpu_milli,
            memory_bytes,
        }
    }

    /// Capacity declared by a catalog entry.
    pub fn from_machine_type(machine_type: &MachineType) -> Result<Self, QuantityError> {
        Ok(Self {
            cpu_milli: machine_type.cpu.milli_value()?,
            memory_bytes: machine_type.memory.value()?,
        })
    }
}

/// Reservation computed for one machine type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationResult {
    pub cpu_milli: i64,
    pub memory_bytes: i64,
    pub max_pids: i64,
}

impl ReservationResult {
    /// The reservation as kubelet `kubeReserved` quantities (`70m`, `1288490188`, `20k`).
    pub fn to_kube_reserved(&self) -> KubeletConfigReserved {
        KubeletConfigReserved {
            cpu: Some(Quantity::from_milli(self.cpu_milli)),
            memory: Some(Quantity::from_binary(self.memory_bytes)),
            ephemeral_storage: None,
            pid: Some(Quantity::from_decimal(self.max_pids)),
        }
    }
}

pub fn calculate_reservation(machine: MachineCapacity) -> ReservationResult {
    ReservationResult {
        cpu_milli: calculate_cpu_reservation(machine.cpu_milli),
        memory_bytes: calculate_memory_reservation(machine.memory_bytes),
        max_pids: RESERVED_PIDS,
    }
}

/// CPU reservation in milli-cores for a machine with `cpu_milli` milli-cores.
pub fn calculate_cpu_reservation(cpu_milli: i64) -> i64 {
    let cpu_milli = cpu_milli.max(0);
    let cores = cpu_milli / 1000;
    let mut reserved = 0;

    if cpu_milli > 0 {
        reserved += 60;
    }
    if cpu_milli > 1000 {
        reserved += 10;
    }
    if cpu_milli > 2000 {
        reserved += (cores.min(4) - 2) * 5;
    }
    if cpu_milli > 4000 {
        reserved += (cores - 4) * 5 / 2;
    }
    reserved
}

/// Memory reservation in bytes for a machine with `memory` bytes.
pub fn calculate_memory_reservation(memory: i64) -> i64 {
    let memory = memory.max(0);
    if memory < GIB {
        return SMALL_MACHINE_MEMORY_RESERVATION;
    }

    let mut reserved = memory.min(4 * GIB) / 4;
    if memory > 4 * GIB {
        reserved += (memory.min(8 * GIB) - 4 * GIB) / 5;
    }
    if memory > 8 * GIB {
        reserved += (memory.min(16 * GIB) - 8 * GIB) / 10;
    }
    if memory > 16 * GIB {
        reserved += (memory.min(128 * GIB) - 16 * GIB) / 100 * 6;
    }
    if memory > 128 * GIB {
        reserved += (memory - 128 * GIB) / 100 * 2;
    }
    reserved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_reservation_calibration() {
        let cases = [
            (0, 0),
            (1000, 60),
            (2000, 70),
            (3000, 75),
            (4000, 80),
            (5000, 82),
            (6000, 85),
            (10000, 95),
        ];
        for (cpu, expected) in cases {
            assert_eq!(calculate_cpu_reservation(cpu), expected, "cpu {}m", cpu);
        }
    }

    #[test]
    fn test_cpu_reservation_fractional_cores() {
        assert_eq!(calculate_cpu_reservation(500), 60);
        assert_eq!(calculate_cpu_reservation(1500), 70);
        // Tier 3 counts whole cores only.
        assert_eq!(calculate_cpu_reservation(2500), 70);
        assert_eq!(calculate_cpu_reservation(96000), 80 + 92 * 5 / 2);
    }

    #[test]
    fn test_memory_reservation_calibration() {
        let cases = [
            (500 * MIB, 255 * MIB),
            (GIB, 256 * MIB),
            (2 * GIB, 512 * MIB),
            (4 * GIB, GIB),
            (8 * GIB, 1_932_735_283),
            (16 * GIB, 2_791_728_742),
            (32 * GIB, 3_822_520_888),
            (64 * GIB, 5_884_105_192),
            (128 * GIB, 10_007_273_794),
            (256 * GIB, 12_756_052_862),
            (1024 * GIB, 29_248_727_280),
        ];
        for (memory, expected) in cases {
            assert_eq!(calculate_memory_reservation(memory), expected, "memory {}", memory);
        }
    }

    #[test]
    fn test_memory_tiers_are_cumulative() {
        assert_eq!(calculate_memory_reservation(8 * GIB), GIB + 4 * GIB / 5);
        assert_eq!(
            calculate_memory_reservation(16 * GIB),
            GIB + 4 * GIB / 5 + 8 * GIB / 10
        );
    }

    #[test]
    fn test_negative_input_treated_as_zero() {
        assert_eq!(calculate_cpu_reservation(-1000), 0);
        assert_eq!(calculate_memory_reservation(-GIB), 255 * MIB);
    }

    #[test]
    fn test_n1_standard_2() {
        let machine_type = MachineType {
            name: "n1-standard-2".to_string(),
            cpu: Quantity::parse("2").unwrap(),
            memory: Quantity::parse("5Gi").unwrap(),
            ..Default::default()
        };
        let capacity = MachineCapacity::from_machine_type(&machine_type).unwrap();
        let result = calculate_reservation(capacity);
        assert_eq!(
            result,
            ReservationResult {
                cpu_milli: 70,
                memory_bytes: 1_288_490_188,
                max_pids: 20_000,
            }
        );

        let reserved = result.to_kube_reserved();
        assert_eq!(reserved.cpu.unwrap().as_str(), "70m");
        assert_eq!(reserved.memory.unwrap().as_str(), "1288490188");
        assert_eq!(reserved.pid.unwrap().as_str(), "20k");
        assert!(reserved.ephemeral_storage.is_none());
    }

    #[test]
    fn test_from_machine_type_rejects_overflowing_quantity() {
        let machine_type = MachineType {
            name: "huge".to_string(),
            cpu: Quantity::parse("100E").unwrap(),
            memory: Quantity::parse("1Gi").unwrap(),
            ..Default::default()
        };
        assert!(MachineCapacity::from_machine_type(&machine_type).is_err());
    }
}
