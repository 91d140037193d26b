use std::fmt::{self, Display};

use realtime::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Seat counters for a vehicle. `occupied + available = total` holds after
/// every mutation; counters never go negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    pub total: u32,
    pub occupied: u32,
    pub available: u32,
}

impl Capacity {
    #[must_use]
    pub const fn new(total: u32) -> Self {
        Self { total, occupied: 0, available: total }
    }

    /// Replace the occupied count, clamping to `total`, and recompute the
    /// available count.
    pub fn set_occupied(&mut self, occupied: u32) {
        self.occupied = occupied.min(self.total);
        self.available = self.total - self.occupied;
    }

    /// Resize the vehicle, preserving the occupied count where possible.
    pub fn set_total(&mut self, total: u32) {
        self.total = total;
        self.set_occupied(self.occupied);
    }

    /// One passenger boards.
    ///
    /// # Errors
    ///
    /// Returns `Error::CapacityFull` when the vehicle is already at
    /// capacity; counters are left unchanged.
    pub fn board(&mut self) -> Result<()> {
        if self.occupied >= self.total {
            return Err(Error::CapacityFull(format!("{} of {} seats occupied", self.occupied, self.total)));
        }
        self.occupied += 1;
        self.available = self.total - self.occupied;
        Ok(())
    }

    /// One passenger alights. Alighting an empty vehicle floors at zero.
    pub fn alight(&mut self) {
        self.occupied = self.occupied.saturating_sub(1);
        self.available = self.total - self.occupied;
    }

    /// GTFS-style occupancy bucket derived from the counters.
    #[must_use]
    pub const fn status(&self) -> OccupancyStatus {
        if self.total == 0 || self.occupied < threshold(self.total, 5) {
            OccupancyStatus::Empty
        } else if self.occupied < threshold(self.total, 40) {
            OccupancyStatus::ManySeatsAvailable
        } else if self.occupied < threshold(self.total, 90) {
            OccupancyStatus::FewSeatsAvailable
        } else if self.occupied < self.total {
            OccupancyStatus::StandingRoomOnly
        } else {
            OccupancyStatus::Full
        }
    }
}

const fn threshold(base: u32, percent: u32) -> u32 {
    base.saturating_mul(percent).div_euclid(100)
}

/// Occupancy bucket published with passenger updates, serialized as its
/// numeric GTFS code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum OccupancyStatus {
    Empty = 0,
    ManySeatsAvailable = 1,
    FewSeatsAvailable = 2,
    StandingRoomOnly = 3,
    CrushedStandingRoomOnly = 4,
    Full = 5,
    NotAcceptingPassengers = 6,
}

impl Display for OccupancyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&(*self as u8).to_string())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn counters_stay_consistent() {
        let mut capacity = Capacity::new(40);
        capacity.board().unwrap();
        capacity.board().unwrap();

        assert_eq!(capacity.occupied, 2);
        assert_eq!(capacity.available, 38);
        assert_eq!(capacity.occupied + capacity.available, capacity.total);
    }

    #[test]
    fn board_rejected_when_full() {
        let mut capacity = Capacity::new(2);
        capacity.board().unwrap();
        capacity.board().unwrap();

        let err = capacity.board().unwrap_err();
        assert!(matches!(err, Error::CapacityFull(_)));
        assert_eq!(capacity.occupied, 2);
        assert_eq!(capacity.available, 0);
    }

    #[test]
    fn alight_floors_at_zero() {
        let mut capacity = Capacity::new(10);
        capacity.alight();

        assert_eq!(capacity.occupied, 0);
        assert_eq!(capacity.available, 10);
    }

    #[test]
    fn occupancy_buckets() {
        let mut capacity = Capacity::new(100);
        assert_eq!(capacity.status(), OccupancyStatus::Empty);

        capacity.set_occupied(20);
        assert_eq!(capacity.status(), OccupancyStatus::ManySeatsAvailable);

        capacity.set_occupied(60);
        assert_eq!(capacity.status(), OccupancyStatus::FewSeatsAvailable);

        capacity.set_occupied(95);
        assert_eq!(capacity.status(), OccupancyStatus::StandingRoomOnly);

        capacity.set_occupied(100);
        assert_eq!(capacity.status(), OccupancyStatus::Full);
    }

    #[test]
    fn occupancy_serializes_numeric() {
        let json = serde_json::to_string(&OccupancyStatus::StandingRoomOnly).unwrap();
        assert_eq!(json, "3");
    }

    #[test]
    fn set_occupied_clamps_to_total() {
        let mut capacity = Capacity::new(30);
        capacity.set_occupied(45);

        assert_eq!(capacity.occupied, 30);
        assert_eq!(capacity.available, 0);
    }
}
