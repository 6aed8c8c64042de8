use std::collections::HashSet;

use super::types::MatchResult;

/// Drop every match whose id is in `hidden`, keeping the order of the rest.
pub fn visible(matches: &[MatchResult], hidden: &HashSet<String>) -> Vec<MatchResult> {
    matches
        .iter()
        .filter(|m| !hidden.contains(&m.match_id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(id: &str) -> MatchResult {
        MatchResult {
            match_id: id.to_string(),
            champion_id: 103,
            champion_name: "Ahri".to_string(),
            win: true,
            kills: 5,
            deaths: 2,
            assists: 7,
        }
    }

    fn ids(matches: &[MatchResult]) -> Vec<&str> {
        matches.iter().map(|m| m.match_id.as_str()).collect()
    }

    #[test]
    fn empty_hidden_set_is_identity() {
        let matches = vec![game("m3"), game("m2"), game("m1")];

        assert_eq!(visible(&matches, &HashSet::new()), matches);
    }

    #[test]
    fn hidden_matches_are_removed_in_order() {
        let matches = vec![game("m4"), game("m3"), game("m2"), game("m1")];
        let hidden = HashSet::from(["m3".to_string(), "m1".to_string()]);

        assert_eq!(ids(&visible(&matches, &hidden)), vec!["m4", "m2"]);
    }

    #[test]
    fn stale_marks_are_inert() {
        let matches = vec![game("m9"), game("m8")];
        let hidden = HashSet::from(["m1".to_string()]);

        assert_eq!(visible(&matches, &hidden), matches);
    }
}
