//! 距离分析 (Proximity analyzer)
//!
//! 对所有无序对 (i<j) 计算质心欧氏距离, 距离 < 阈值即为违规.
//! 每帧人数只有几十个, 直接 O(n²) 遍历.

use super::types::{PersonDetection, ProximityPair};

pub fn find_close_pairs(
    persons: &[PersonDetection],
    distance_threshold: f64,
) -> Vec<ProximityPair> {
    let mut pairs = Vec::new();
    for (i, a) in persons.iter().enumerate() {
        for (j, b) in persons.iter().enumerate().skip(i + 1) {
            let distance = a.centroid.distance(&b.centroid);
            if distance < distance_threshold {
                log::debug!(
                    "距离过近: ({}, {}) ↔ ({}, {}) = {:.1}px",
                    a.centroid.x,
                    a.centroid.y,
                    b.centroid.x,
                    b.centroid.y,
                    distance
                );
                pairs.push(ProximityPair { i, j, distance });
            }
        }
    }
    pairs
}

/// 参与至少一个违规对的行人下标 (升序, 去重)
pub fn violators(pairs: &[ProximityPair], count: usize) -> Vec<usize> {
    let mut flags = vec![false; count];
    for p in pairs {
        if let Some(f) = flags.get_mut(p.i) {
            *f = true;
        }
        if let Some(f) = flags.get_mut(p.j) {
            *f = true;
        }
    }
    flags
        .iter()
        .enumerate()
        .filter_map(|(idx, &hit)| hit.then_some(idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::{Centroid, PixelBox};

    fn person_at(x: i32, y: i32) -> PersonDetection {
        let bbox = PixelBox {
            x_min: x - 10,
            y_min: y,
            x_max: x + 10,
            y_max: y + 50,
        };
        PersonDetection {
            confidence: 0.9,
            bbox,
            centroid: Centroid { x, y },
        }
    }

    #[test]
    fn test_close_pair_reported() {
        let persons = [person_at(100, 100), person_at(150, 100)];
        let pairs = find_close_pairs(&persons, 250.0);
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].i, pairs[0].j), (0, 1));
        assert_eq!(pairs[0].distance, 50.0);
    }

    #[test]
    fn test_small_threshold_reports_nothing() {
        let persons = [person_at(100, 100), person_at(150, 100)];
        assert!(find_close_pairs(&persons, 10.0).is_empty());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let persons = [person_at(0, 0), person_at(30, 40)];
        assert!(find_close_pairs(&persons, 50.0).is_empty());
        assert_eq!(find_close_pairs(&persons, 50.000001).len(), 1);
    }

    #[test]
    fn test_no_duplicates_and_ordered_indices() {
        let persons = [
            person_at(0, 0),
            person_at(10, 0),
            person_at(20, 0),
            person_at(1000, 1000),
        ];
        let pairs = find_close_pairs(&persons, 250.0);
        let idx: Vec<(usize, usize)> = pairs.iter().map(|p| (p.i, p.j)).collect();
        assert_eq!(idx, vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(find_close_pairs(&[], 250.0).is_empty());
        assert!(find_close_pairs(&[person_at(5, 5)], 250.0).is_empty());
    }

    #[test]
    fn test_coincident_centroids_are_close() {
        let persons = [person_at(7, 7), person_at(7, 7)];
        let pairs = find_close_pairs(&persons, 1.0);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].distance, 0.0);
    }

    #[test]
    fn test_violators() {
        let persons = [
            person_at(0, 0),
            person_at(500, 500),
            person_at(10, 0),
        ];
        let pairs = find_close_pairs(&persons, 250.0);
        assert_eq!(violators(&pairs, persons.len()), vec![0, 2]);
    }
}
