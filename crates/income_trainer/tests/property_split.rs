use income_trainer::deterministic::LcgRng;
use income_trainer::split::stratified_split;
use proptest::prelude::*;

proptest! {
    #[test]
    fn split_partitions_every_row_once(
        labels in prop::collection::vec(0usize..2, 4..200),
        seed in any::<i64>(),
    ) {
        let counts = [0, 1].map(|class| labels.iter().filter(|&&l| l == class).count());
        prop_assume!(counts.iter().all(|&count| count == 0 || count >= 2));
        prop_assume!(counts.iter().filter(|&&count| count > 0).count() == 2);

        let split = stratified_split(&labels, 2, 0.2, seed).unwrap();

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        prop_assert_eq!(all, (0..labels.len()).collect::<Vec<_>>());

        for class in 0..2 {
            let in_test = split.test.iter().filter(|&&row| labels[row] == class).count();
            let expected = ((counts[class] as f64 * 0.2).round() as usize).clamp(1, counts[class] - 1);
            prop_assert_eq!(in_test, expected);
        }
    }

    #[test]
    fn next_range_stays_in_bounds(seed in any::<i64>(), max in 1usize..10_000) {
        let mut rng = LcgRng::new(seed);
        for _ in 0..64 {
            prop_assert!(rng.next_range(max) < max);
        }
    }
}
