// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Angular and distance gates applied to every channel before it becomes a
//! point.

use crate::trigon::ONE_ROUND;

/// Horizontal sector `[start, end)` in centidegrees, possibly wrapping
/// through zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanSection {
    start: i32,
    end: i32,
    cross_zero: bool,
}

impl ScanSection {
    /// A `start` greater than `end` produces a sector that wraps through
    /// zero. An `end` of exactly 36000 is kept so `(0, 36000)` covers the
    /// whole rotation, as does any pair spanning a full turn or more.
    pub fn new(start: i32, end: i32) -> Self {
        if end.saturating_sub(start) >= ONE_ROUND {
            return Self {
                start: 0,
                end: ONE_ROUND,
                cross_zero: false,
            };
        }

        let start = start.rem_euclid(ONE_ROUND);
        let end = if (0..=ONE_ROUND).contains(&end) {
            end
        } else {
            end.rem_euclid(ONE_ROUND)
        };

        Self {
            start,
            end,
            cross_zero: start > end,
        }
    }

    /// Build from degrees, as found in user configuration.
    pub fn from_degrees(start: f32, end: f32) -> Self {
        Self::new((start * 100.0) as i32, (end * 100.0) as i32)
    }

    #[inline]
    pub fn contains(&self, angle: i32) -> bool {
        if self.cross_zero {
            angle >= self.start || angle < self.end
        } else {
            angle >= self.start && angle < self.end
        }
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }
}

impl Default for ScanSection {
    fn default() -> Self {
        Self::new(0, ONE_ROUND)
    }
}

/// Inclusive distance range in meters.
///
/// User limits can only narrow the range the device physically measures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceSection {
    min: f32,
    max: f32,
}

impl DistanceSection {
    pub fn new(min: f32, max: f32, usr_min: f32, usr_max: f32) -> Self {
        Self {
            min: min.max(usr_min),
            max: max.min(usr_max),
        }
    }

    #[inline]
    pub fn contains(&self, distance: f32) -> bool {
        self.min <= distance && distance <= self.max
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_section_full_turn_from_offset() {
        let s = ScanSection::from_degrees(10.0, 370.0);
        assert_eq!((s.start(), s.end()), (0, ONE_ROUND));
        for angle in (0..ONE_ROUND).step_by(500) {
            assert!(s.contains(angle), "{}", angle);
        }
        assert!(ScanSection::new(-9000, 27000).contains(35999));

        // Just short of a full turn still wraps
        let s = ScanSection::new(1000, 36999);
        assert!(s.contains(500));
        assert!(!s.contains(999));
    }

    #[test]
    fn test_scan_section_wrapping() {
        let s = ScanSection::new(35000, 1000);
        assert!(s.contains(35500));
        assert!(s.contains(500));
        assert!(s.contains(35000));
        assert!(!s.contains(1000));
        assert!(!s.contains(2000));
        assert!(!s.contains(30000));
    }

    #[test]
    fn test_scan_section_plain() {
        let s = ScanSection::new(1000, 2000);
        assert!(s.contains(1000));
        assert!(s.contains(1999));
        assert!(!s.contains(2000));
        assert!(!s.contains(999));
    }

    #[test]
    fn test_scan_section_full_rotation() {
        let s = ScanSection::default();
        assert_eq!(s.start(), 0);
        assert_eq!(s.end(), 36000);
        assert!(s.contains(0));
        assert!(s.contains(35999));
    }

    #[test]
    fn test_scan_section_normalizes_bounds() {
        let s = ScanSection::new(36500, 37000);
        assert_eq!(s.start(), 500);
        assert_eq!(s.end(), 1000);

        let s = ScanSection::from_degrees(350.0, 10.0);
        assert_eq!(s.start(), 35000);
        assert_eq!(s.end(), 1000);
        assert!(s.contains(100));
    }

    #[test]
    fn test_distance_section() {
        let d = DistanceSection::new(0.4, 200.0, 0.0, 10.0);
        assert_eq!(d.min(), 0.4);
        assert_eq!(d.max(), 10.0);
        assert!(!d.contains(0.3));
        assert!(d.contains(5.0));
        assert!(!d.contains(15.0));
        assert!(d.contains(0.4));
        assert!(d.contains(10.0));
    }

    #[test]
    fn test_distance_section_cannot_widen() {
        let d = DistanceSection::new(0.4, 200.0, 0.0, 500.0);
        assert_eq!(d.min(), 0.4);
        assert_eq!(d.max(), 200.0);
    }
}
