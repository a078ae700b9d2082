use rand::seq::SliceRandom;
use rand::Rng;

/// Words a round's secret is drawn from.
pub const WORDS: [&str; 10] = [
    "apple", "house", "tree", "train", "dog", "cat", "flower", "phone", "book", "car",
];

/// Host recorded for a game before anyone has joined it.
pub const PLACEHOLDER_HOST: &str = "unknown";

pub const MIN_POINTS: u32 = 5;

pub fn pick_word<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    WORDS.choose(rng).copied().unwrap_or(WORDS[0])
}

/// Points for a correct guess with `time_left` seconds on the clock.
pub fn points_for(time_left: u32) -> u32 {
    (time_left / 2 + MIN_POINTS).max(MIN_POINTS)
}

/// Case-insensitive comparison with surrounding whitespace ignored.
pub fn is_correct_guess(guess: &str, secret: &str) -> bool {
    guess.trim().to_lowercase() == secret.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_points_formula() {
        assert_eq!(points_for(60), 35);
        assert_eq!(points_for(40), 25);
        assert_eq!(points_for(41), 25);
        assert_eq!(points_for(1), 5);
        assert_eq!(points_for(0), 5);
    }

    #[test]
    fn test_points_never_increase_as_time_runs_out() {
        let mut previous = points_for(60);
        for time_left in (0..60).rev() {
            let points = points_for(time_left);
            assert!(points <= previous);
            assert!(points >= MIN_POINTS);
            previous = points;
        }
    }

    #[test]
    fn test_guess_comparison() {
        assert!(is_correct_guess("Apple ", "apple"));
        assert!(is_correct_guess("  APPLE", " apple "));
        assert!(!is_correct_guess("apples", "apple"));
        assert!(!is_correct_guess("app le", "apple"));
    }

    #[test]
    fn test_pick_word_comes_from_vocabulary() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert!(WORDS.contains(&pick_word(&mut rng)));
        }
    }
}
