use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use shardci_catalog::ScenarioFile;
use shardci_metadata::PartitionStrategy;

use crate::identity::ShardId;

/// Something with an estimated execution cost.
pub trait Weighted {
    fn weight(&self) -> u64;
}

impl Weighted for ScenarioFile {
    fn weight(&self) -> u64 {
        self.weight
    }
}

/// A fixed set of scenario files run together in one isolated environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    id: ShardId,
    files: Vec<ScenarioFile>,
    weight: u64,
}

impl Shard {
    pub fn new(id: ShardId, files: Vec<ScenarioFile>) -> Self {
        let weight = files.iter().map(Weighted::weight).sum();
        Self { id, files, weight }
    }

    pub const fn id(&self) -> &ShardId {
        &self.id
    }

    pub fn files(&self) -> &[ScenarioFile] {
        &self.files
    }

    pub const fn weight(&self) -> u64 {
        self.weight
    }
}

/// Splits `files` into at most `shard_count` shards.
///
/// Only populated shards are returned, ordered by ordinal. No files means no shards.
pub fn partition_files(
    files: Vec<ScenarioFile>,
    shard_count: NonZeroUsize,
    strategy: PartitionStrategy,
    rng: &mut fastrand::Rng,
) -> Vec<Shard> {
    let groups = match strategy {
        PartitionStrategy::Weighted => partition_weighted(files, shard_count, rng),
        PartitionStrategy::Positional => partition_positional(files, shard_count),
    };

    groups
        .into_iter()
        .map(|(ordinal, files)| Shard::new(ShardId::ordinal(ordinal), files))
        .collect()
}

/// Round-robin assignment: item `i` goes to shard `(i + 1) mod n`, with `0` meaning `n`.
pub fn partition_positional<T>(items: Vec<T>, shard_count: NonZeroUsize) -> BTreeMap<usize, Vec<T>> {
    let count = shard_count.get();
    let mut shards: BTreeMap<usize, Vec<T>> = BTreeMap::new();

    for (index, item) in items.into_iter().enumerate() {
        let ordinal = match (index + 1) % count {
            0 => count,
            ordinal => ordinal,
        };
        shards.entry(ordinal).or_default().push(item);
    }

    shards
}

/// Greedy weight balancing.
///
/// Shuffles the items, then fills shard 1, 2, ... in turn: a shard is closed as
/// soon as its accumulated weight is `>=` the average `total / n`. Whatever is
/// left when the last shard opens stays in it. Fewer than `n` shards come back
/// when the early shards absorb all the weight.
pub fn partition_weighted<T: Weighted>(
    mut items: Vec<T>,
    shard_count: NonZeroUsize,
    rng: &mut fastrand::Rng,
) -> BTreeMap<usize, Vec<T>> {
    rng.shuffle(&mut items);

    let count = shard_count.get();
    let total: u64 = items.iter().map(Weighted::weight).sum();
    let mut shards: BTreeMap<usize, Vec<T>> = BTreeMap::new();
    let mut ordinal = 1;
    let mut accumulated = 0u64;

    for item in items {
        accumulated += item.weight();
        shards.entry(ordinal).or_default().push(item);

        // accumulated >= total / count, without integer division.
        if ordinal < count && u128::from(accumulated) * count as u128 >= u128::from(total) {
            ordinal += 1;
            accumulated = 0;
        }
    }

    shards
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    impl Weighted for u64 {
        fn weight(&self) -> u64 {
            *self
        }
    }

    /// A weighted item that remembers its input position.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct Item {
        index: usize,
        weight: u64,
    }

    impl Weighted for Item {
        fn weight(&self) -> u64 {
            self.weight
        }
    }

    fn items(weights: &[u64]) -> Vec<Item> {
        weights
            .iter()
            .enumerate()
            .map(|(index, &weight)| Item { index, weight })
            .collect()
    }

    fn n(count: usize) -> NonZeroUsize {
        NonZeroUsize::new(count).expect("non-zero")
    }

    fn shard_weights<T: Weighted>(shards: &BTreeMap<usize, Vec<T>>) -> Vec<u64> {
        shards
            .values()
            .map(|items| items.iter().map(Weighted::weight).sum())
            .collect()
    }

    #[test]
    fn positional_round_robin() {
        let shards = partition_positional(vec!['a', 'b', 'c', 'd', 'e'], n(2));

        assert_eq!(shards[&1], ['a', 'c', 'e']);
        assert_eq!(shards[&2], ['b', 'd']);
    }

    #[test]
    fn positional_with_fewer_items_than_shards() {
        let shards = partition_positional(vec!['a', 'b'], n(4));

        assert_eq!(shards.keys().copied().collect::<Vec<_>>(), [1, 2]);
    }

    #[test]
    fn weighted_places_every_item_exactly_once() {
        let input = items(&[5, 0, 3, 3, 8, 1, 1, 2, 9, 4, 0, 7]);

        for seed in 0..200 {
            for count in 1..=6 {
                let mut rng = fastrand::Rng::with_seed(seed);
                let shards = partition_weighted(input.clone(), n(count), &mut rng);

                assert!(!shards.is_empty() && shards.len() <= count);
                assert!(shards.values().all(|items| !items.is_empty()));

                let mut placed: Vec<Item> = shards.into_values().flatten().collect();
                placed.sort();
                assert_eq!(placed, input);
            }
        }
    }

    #[test]
    fn weighted_keeps_shards_within_twice_the_average() {
        for seed in 0..500 {
            let mut rng = fastrand::Rng::with_seed(seed);
            let shards = partition_weighted(vec![1u64, 1, 1, 1, 1, 1, 6], n(3), &mut rng);

            let weights = shard_weights(&shards);
            let total: u64 = weights.iter().sum();
            let max = weights.iter().copied().max().unwrap_or_default();

            // max / (total / produced) <= 2
            assert!(
                max * weights.len() as u64 <= 2 * total,
                "seed {seed}: unbalanced shards {weights:?}"
            );
        }
    }

    #[test]
    fn weighted_closes_shard_when_reaching_the_average_exactly() {
        // The average is 2: with `>=` the third item opens the second shard.
        for seed in 0..50 {
            let mut rng = fastrand::Rng::with_seed(seed);
            let shards = partition_weighted(vec![1u64, 1, 1, 1], n(2), &mut rng);

            assert_eq!(shard_weights(&shards), [2, 2]);
        }
    }

    #[test]
    fn weighted_equal_items_get_one_shard_each() {
        let mut rng = fastrand::Rng::with_seed(7);
        let shards = partition_weighted(vec![2u64, 2, 2], n(3), &mut rng);

        assert_eq!(shard_weights(&shards), [2, 2, 2]);
    }

    #[test]
    fn weighted_remainder_lands_in_last_shard() {
        let mut rng = fastrand::Rng::with_seed(3);
        let shards = partition_weighted(vec![0u64, 0, 0, 0, 0], n(2), &mut rng);

        // A zero average closes the first shard after one item.
        assert_eq!(shards[&1].len(), 1);
        assert_eq!(shards[&2].len(), 4);
    }

    #[test]
    fn weighted_may_use_fewer_shards() {
        for seed in 0..50 {
            let mut rng = fastrand::Rng::with_seed(seed);
            let shards = partition_weighted(vec![10u64, 1], n(4), &mut rng);

            assert!((1..=2).contains(&shards.len()));
        }
    }

    #[test]
    fn single_shard_takes_everything() {
        let mut rng = fastrand::Rng::with_seed(11);
        let shards = partition_weighted(vec![4u64, 1, 9], n(1), &mut rng);

        assert_eq!(shard_weights(&shards), [14]);
    }

    #[test]
    fn no_items_no_shards() {
        let mut rng = fastrand::Rng::with_seed(0);
        assert!(partition_weighted(Vec::<u64>::new(), n(3), &mut rng).is_empty());
        assert!(partition_positional(Vec::<u64>::new(), n(3)).is_empty());
    }

    #[test]
    fn partition_files_numbers_shards_from_one() {
        let file = |name: &str, weight| ScenarioFile {
            path: name.into(),
            tags: std::collections::BTreeSet::new(),
            weight,
        };
        let files = vec![file("a.feature", 3), file("b.feature", 1), file("c.feature", 5)];

        let shards = partition_files(
            files,
            n(2),
            PartitionStrategy::Positional,
            &mut fastrand::Rng::with_seed(0),
        );

        let summary: Vec<_> = shards
            .iter()
            .map(|shard| (shard.id().as_str(), shard.files().len(), shard.weight()))
            .collect();
        assert_eq!(summary, [("1", 2, 8), ("2", 1, 1)]);
    }
}
