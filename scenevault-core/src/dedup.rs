use std::collections::HashMap;

use chrono::{DateTime, Utc};
use scenevault_model::{FingerprintKind, FingerprintRow, SceneId};

use crate::config::DetectorConfig;

/// One accepted match between two scenes at a single fingerprint kind.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchedPair {
    pub scene_a: SceneId,
    pub scene_b: SceneId,
    pub kind: FingerprintKind,
    pub matched_positions: usize,
    pub span: i64,
    pub offset: i64,
}

/// Input the caller supplies about a scene's current artifacts for
/// representative selection.
#[derive(Clone, Copy, Debug)]
pub struct SceneSummary {
    pub scene_id: SceneId,
    pub bitrate_bps: u64,
    pub created_at: DateTime<Utc>,
}

/// A connected component of probably-duplicate scenes.
#[derive(Clone, Debug, PartialEq)]
pub struct DuplicateGroup {
    pub representative: SceneId,
    pub members: Vec<SceneId>,
}

/// Pure function over the fingerprint corpus. Holds no state and
/// talks to no store; the caller loads rows via `FingerprintStore::all` and
/// scene summaries via `SceneStore` and passes them in. Kept this way (rather
/// than owning an `Arc<dyn FingerprintStore>`) because detection is an
/// on-demand, batch analysis — there is no running "detector task" the way
/// there is a scheduler or scanner.
pub struct DuplicateDetector {
    config: DetectorConfig,
}

impl DuplicateDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Runs the full pipeline for one fingerprint kind: index, prune common
    /// hashes, generate candidates via posting-list intersection, align and
    /// score, apply accept thresholds. Returns every accepted pair.
    pub fn find_matches(&self, kind: FingerprintKind, rows: &[FingerprintRow]) -> Vec<MatchedPair> {
        let index = self.build_index(rows);
        let candidates = self.candidate_pairs(&index);

        let mut by_scene: HashMap<SceneId, Vec<&FingerprintRow>> = HashMap::new();
        for row in rows {
            by_scene.entry(row.scene_id).or_default().push(row);
        }

        let mut accepted = Vec::new();
        for (scene_a, scene_b) in candidates {
            let rows_a = by_scene.get(&scene_a).map(Vec::as_slice).unwrap_or(&[]);
            let rows_b = by_scene.get(&scene_b).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(pair) = self.align_and_score(kind, scene_a, rows_a, scene_b, rows_b) {
                accepted.push(pair);
            }
        }
        accepted
    }

    /// `hash -> [(scene_id, position)]`, with hashes touching more than
    /// `max_hash_occurrences` distinct scenes dropped before matching (these
    /// tend to be silence or intro stings shared by unrelated scenes).
    fn build_index(&self, rows: &[FingerprintRow]) -> HashMap<u64, Vec<(SceneId, u32)>> {
        let mut index: HashMap<u64, Vec<(SceneId, u32)>> = HashMap::new();
        for row in rows {
            index.entry(row.hash).or_default().push((row.scene_id, row.position));
        }
        index.retain(|_, postings| {
            let distinct_scenes: std::collections::HashSet<SceneId> =
                postings.iter().map(|(scene_id, _)| *scene_id).collect();
            distinct_scenes.len() <= self.config.max_hash_occurrences
        });
        index
    }

    /// Streaming intersection over posting lists: every pair of scenes
    /// sharing at least `min_hashes` index entries.
    fn candidate_pairs(&self, index: &HashMap<u64, Vec<(SceneId, u32)>>) -> Vec<(SceneId, SceneId)> {
        let mut shared_counts: HashMap<(SceneId, SceneId), usize> = HashMap::new();
        for postings in index.values() {
            let mut scenes: Vec<SceneId> = postings.iter().map(|(scene_id, _)| *scene_id).collect();
            scenes.sort();
            scenes.dedup();
            for i in 0..scenes.len() {
                for j in (i + 1)..scenes.len() {
                    *shared_counts.entry((scenes[i], scenes[j])).or_insert(0) += 1;
                }
            }
        }
        shared_counts
            .into_iter()
            .filter(|(_, count)| *count >= self.config.min_hashes)
            .map(|(pair, _)| pair)
            .collect()
    }

    /// Bins `δ = posB − posA` over every shared hash at `delta_tolerance`
    /// width; the densest bin is the proposed offset. Applies the audio or
    /// visual accept thresholds for the winning bin.
    fn align_and_score(
        &self,
        kind: FingerprintKind,
        scene_a: SceneId,
        rows_a: &[&FingerprintRow],
        scene_b: SceneId,
        rows_b: &[&FingerprintRow],
    ) -> Option<MatchedPair> {
        let mut by_hash_b: HashMap<u64, Vec<u32>> = HashMap::new();
        for row in rows_b {
            by_hash_b.entry(row.hash).or_default().push(row.position);
        }

        let tolerance = self.config.delta_tolerance.max(1);
        let mut bins: HashMap<i64, Vec<(u32, u32)>> = HashMap::new();
        for row in rows_a {
            let Some(positions_b) = by_hash_b.get(&row.hash) else { continue };
            for &pos_b in positions_b {
                let delta = i64::from(pos_b) - i64::from(row.position);
                let bin = delta.div_euclid(tolerance);
                bins.entry(bin).or_default().push((row.position, pos_b));
            }
        }

        let (winning_bin, pairs) = bins.into_iter().max_by_key(|(_, pairs)| pairs.len())?;
        let matched_positions = match kind {
            FingerprintKind::Audio => pairs.len(),
            FingerprintKind::Visual => pairs
                .iter()
                .filter(|(pos_a, pos_b)| {
                    hamming_distance(position_hash(rows_a, *pos_a), position_hash(rows_b, *pos_b))
                        <= self.config.visual_hamming_max
                })
                .count(),
        };

        let positions_a: Vec<i64> = pairs.iter().map(|(pos_a, _)| i64::from(*pos_a)).collect();
        let span = positions_a.iter().max()? - positions_a.iter().min()?;

        let accepted = match kind {
            FingerprintKind::Audio => {
                matched_positions >= self.config.audio_min_hashes
                    && span >= self.config.audio_min_span
                    && (matched_positions as f64) / (span.max(1) as f64) >= self.config.audio_density_threshold
            }
            FingerprintKind::Visual => {
                matched_positions >= self.config.visual_min_frames && span >= self.config.visual_min_span
            }
        };

        if !accepted {
            return None;
        }

        Some(MatchedPair {
            scene_a,
            scene_b,
            kind,
            matched_positions,
            span,
            offset: winning_bin * tolerance,
        })
    }

    /// Connected components over the accepted-pair graph, each reported with
    /// a representative: highest bitrate, earliest `created_at` to break
    /// ties.
    pub fn group(&self, pairs: &[MatchedPair], summaries: &[SceneSummary]) -> Vec<DuplicateGroup> {
        let mut parent: HashMap<SceneId, SceneId> = HashMap::new();
        let find_root = |parent: &mut HashMap<SceneId, SceneId>, mut node: SceneId| -> SceneId {
            while let Some(&next) = parent.get(&node) {
                if next == node {
                    break;
                }
                node = next;
            }
            node
        };

        for summary in summaries {
            parent.entry(summary.scene_id).or_insert(summary.scene_id);
        }
        for pair in pairs {
            parent.entry(pair.scene_a).or_insert(pair.scene_a);
            parent.entry(pair.scene_b).or_insert(pair.scene_b);
        }

        for pair in pairs {
            let root_a = find_root(&mut parent, pair.scene_a);
            let root_b = find_root(&mut parent, pair.scene_b);
            if root_a != root_b {
                parent.insert(root_a, root_b);
            }
        }

        let mut by_root: HashMap<SceneId, Vec<SceneId>> = HashMap::new();
        let scene_ids: Vec<SceneId> = parent.keys().copied().collect();
        for scene_id in scene_ids {
            let root = find_root(&mut parent, scene_id);
            by_root.entry(root).or_default().push(scene_id);
        }

        let summary_by_id: HashMap<SceneId, &SceneSummary> =
            summaries.iter().map(|summary| (summary.scene_id, summary)).collect();

        by_root
            .into_values()
            .filter(|members| members.len() > 1)
            .map(|mut members| {
                members.sort();
                let representative = *members
                    .iter()
                    .max_by(|a, b| {
                        let summary_a = summary_by_id.get(a);
                        let summary_b = summary_by_id.get(b);
                        match (summary_a, summary_b) {
                            (Some(sa), Some(sb)) => sa
                                .bitrate_bps
                                .cmp(&sb.bitrate_bps)
                                .then(sb.created_at.cmp(&sa.created_at)),
                            (Some(_), None) => std::cmp::Ordering::Greater,
                            (None, Some(_)) => std::cmp::Ordering::Less,
                            (None, None) => std::cmp::Ordering::Equal,
                        }
                    })
                    .expect("non-empty group");
                DuplicateGroup { representative, members }
            })
            .collect()
    }
}

fn position_hash(rows: &[&FingerprintRow], position: u32) -> u64 {
    rows.iter().find(|row| row.position == position).map(|row| row.hash).unwrap_or(0)
}

fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(scene_id: i64, kind: FingerprintKind, position: u32, hash: u64) -> FingerprintRow {
        FingerprintRow { scene_id: SceneId(scene_id), kind, position, hash }
    }

    #[test]
    fn accepts_an_audio_match_above_threshold() {
        let config = DetectorConfig { audio_min_hashes: 3, audio_min_span: 2, audio_density_threshold: 0.1, ..DetectorConfig::default() };
        let detector = DuplicateDetector::new(config);

        let mut rows = Vec::new();
        for position in 0..10u32 {
            rows.push(row(1, FingerprintKind::Audio, position, 1000 + position as u64));
            rows.push(row(2, FingerprintKind::Audio, position, 1000 + position as u64));
        }

        let matches = detector.find_matches(FingerprintKind::Audio, &rows);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].matched_positions, 10);
    }

    #[test]
    fn rejects_a_match_below_min_hashes() {
        let config = DetectorConfig { min_hashes: 20, ..DetectorConfig::default() };
        let detector = DuplicateDetector::new(config);

        let rows = vec![
            row(1, FingerprintKind::Audio, 0, 42),
            row(2, FingerprintKind::Audio, 0, 42),
        ];

        let matches = detector.find_matches(FingerprintKind::Audio, &rows);
        assert!(matches.is_empty());
    }

    #[test]
    fn common_hashes_are_pruned_before_matching() {
        let config = DetectorConfig { max_hash_occurrences: 2, min_hashes: 1, ..DetectorConfig::default() };
        let detector = DuplicateDetector::new(config);

        // Hash 7 appears in three scenes: too common, must be dropped.
        let rows = vec![
            row(1, FingerprintKind::Audio, 0, 7),
            row(2, FingerprintKind::Audio, 0, 7),
            row(3, FingerprintKind::Audio, 0, 7),
        ];

        let matches = detector.find_matches(FingerprintKind::Audio, &rows);
        assert!(matches.is_empty());
    }

    #[test]
    fn groups_transitively_connected_pairs_with_highest_bitrate_representative() {
        let detector = DuplicateDetector::new(DetectorConfig::default());
        let now = Utc::now();
        let pairs = vec![
            MatchedPair { scene_a: SceneId(1), scene_b: SceneId(2), kind: FingerprintKind::Audio, matched_positions: 10, span: 20, offset: 0 },
            MatchedPair { scene_a: SceneId(2), scene_b: SceneId(3), kind: FingerprintKind::Audio, matched_positions: 10, span: 20, offset: 0 },
        ];
        let summaries = vec![
            SceneSummary { scene_id: SceneId(1), bitrate_bps: 1_000_000, created_at: now },
            SceneSummary { scene_id: SceneId(2), bitrate_bps: 5_000_000, created_at: now },
            SceneSummary { scene_id: SceneId(3), bitrate_bps: 2_000_000, created_at: now },
        ];

        let groups = detector.group(&pairs, &summaries);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].representative, SceneId(2));
        assert_eq!(groups[0].members, vec![SceneId(1), SceneId(2), SceneId(3)]);
    }
}
