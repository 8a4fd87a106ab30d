//! Points for a played card, from free-text guesses or from self-reports.
//!
//! Everything in here is pure: the same card and answers always yield the same score.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::dao::models::{CardEntity, Correctness, Difficulty};

/// Free-text answers for one card. Absent fields count as empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct Guess<'a> {
    pub song: Option<&'a str>,
    pub artist: Option<&'a str>,
    pub album: Option<&'a str>,
}

/// A participant's own claim of what they knew about the card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelfReport {
    pub song_knew: bool,
    pub artist_knew: bool,
    pub album_knew: bool,
}

/// Result of scoring one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub correctness: Correctness,
    /// One point per correct field.
    pub base: u32,
    /// Extra points from the difficulty multiplier.
    pub bonus: u32,
    /// `base + bonus`.
    pub points: u32,
}

/// Canonical form used to compare answers.
///
/// Lowercases, drops accents, strips everything but letters, digits, `_` and
/// whitespace, then collapses whitespace runs into single spaces.
pub fn normalize(input: &str) -> String {
    let kept: String = input
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Two answers match when their normalized forms are equal.
pub fn same_answer(guess: &str, canonical: &str) -> bool {
    normalize(guess) == normalize(canonical)
}

/// Compare free-text guesses against the card's canonical answers.
pub fn judge_guess(card: &CardEntity, guess: &Guess<'_>) -> Correctness {
    let album_guess = guess.album.unwrap_or_default();
    let album = match &card.album_title {
        Some(title) => same_answer(album_guess, title),
        // Nothing to guess: leaving it blank is the right answer.
        None => album_guess.trim().is_empty(),
    };

    Correctness {
        song: same_answer(guess.song.unwrap_or_default(), &card.song_name),
        artist: same_answer(guess.artist.unwrap_or_default(), &card.artist_name),
        album,
    }
}

/// Self-reports are taken at face value.
pub fn judge_self_report(report: SelfReport) -> Correctness {
    Correctness {
        song: report.song_knew,
        artist: report.artist_knew,
        album: report.album_knew,
    }
}

/// Difficulty multiplier expressed in halves so rounding stays in integers.
fn multiplier_halves(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Easy => 2,
        Difficulty::Medium => 3,
        Difficulty::Hard => 4,
    }
}

/// Multiplier applied to a non-zero base.
pub fn multiplier(difficulty: Difficulty) -> f64 {
    f64::from(multiplier_halves(difficulty)) / 2.0
}

/// Apply the difficulty multiplier to a correctness triple.
///
/// Points are `round(base * multiplier)` rounding halves up, and the bonus is
/// what rounding the product added on top of `base`. A zero base stays zero.
pub fn score(correctness: Correctness, difficulty: Difficulty) -> Score {
    let base = [correctness.song, correctness.artist, correctness.album]
        .into_iter()
        .filter(|correct| *correct)
        .count() as u32;

    if base == 0 {
        return Score {
            correctness,
            base,
            bonus: 0,
            points: 0,
        };
    }

    let points = (base * multiplier_halves(difficulty) + 1) / 2;
    Score {
        correctness,
        base,
        bonus: points - base,
        points,
    }
}

/// Score free-text guesses for a card.
pub fn score_guess(card: &CardEntity, guess: &Guess<'_>) -> Score {
    score(judge_guess(card, guess), card.difficulty)
}

/// Score a self-report for a card.
pub fn score_self_report(card: &CardEntity, report: SelfReport) -> Score {
    score(judge_self_report(report), card.difficulty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(difficulty: Difficulty, album: Option<&str>) -> CardEntity {
        CardEntity {
            id: 1,
            deck_id: 1,
            song_name: "De música ligera".into(),
            artist_name: "Soda Stereo".into(),
            album_title: album.map(Into::into),
            difficulty,
        }
    }

    #[test]
    fn normalize_strips_punctuation_case_and_accents() {
        assert_eq!(normalize("  De  Música\tLigera!! "), "de musica ligera");
        assert_eq!(normalize("Don't You (Forget About Me)"), "dont you forget about me");
        assert_eq!(normalize("a-ha"), "aha");
        assert_eq!(normalize("snake_case 42"), "snake_case 42");
        assert_eq!(normalize("?!."), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "",
            "   ",
            "De música ligera",
            "ÀÉÎÕÜ ñ ç",
            "Ǆemal İstanbul",
            "Guns N' Roses — Appetite",
            "tab\tand\nnewline",
            "日本語 の 歌",
            "x\u{0301}\u{0302}y",
        ];

        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "{sample:?}");
        }
    }

    #[test]
    fn zero_base_scores_zero_on_every_tier() {
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            let result = score(Correctness::default(), difficulty);
            assert_eq!(result.points, 0);
            assert_eq!(result.bonus, 0);
        }
    }

    #[test]
    fn albumless_card_rewards_blank_album_only() {
        let card = card(Difficulty::Easy, None);

        let blank = judge_guess(&card, &Guess::default());
        assert!(blank.album);

        let empty = judge_guess(
            &card,
            &Guess {
                album: Some(""),
                ..Guess::default()
            },
        );
        assert!(empty.album);

        let guessed = judge_guess(
            &card,
            &Guess {
                album: Some("Canción Animal"),
                ..Guess::default()
            },
        );
        assert!(!guessed.album);
    }

    #[test]
    fn albumless_card_rejects_punctuation_only_album() {
        let card = card(Difficulty::Easy, None);

        for album in ["?", "!!", "...", " - "] {
            let result = judge_guess(
                &card,
                &Guess {
                    album: Some(album),
                    ..Guess::default()
                },
            );
            assert!(!result.album, "{album:?}");
        }

        let padded = judge_guess(
            &card,
            &Guess {
                album: Some("  \t "),
                ..Guess::default()
            },
        );
        assert!(padded.album);
    }

    #[test]
    fn medium_card_without_album_full_marks() {
        let card = card(Difficulty::Medium, None);
        let result = score_guess(
            &card,
            &Guess {
                song: Some("de musica ligera!!"),
                artist: Some("SODA STEREO"),
                album: Some(""),
            },
        );

        assert_eq!(
            result.correctness,
            Correctness {
                song: true,
                artist: true,
                album: true
            }
        );
        assert_eq!(result.base, 3);
        assert_eq!(result.points, 5);
        assert_eq!(result.bonus, 2);
    }

    #[test]
    fn multiplier_rounds_half_up() {
        let one = Correctness {
            song: true,
            ..Correctness::default()
        };
        assert_eq!(score(one, Difficulty::Easy).points, 1);
        assert_eq!(score(one, Difficulty::Medium).points, 2);
        assert_eq!(score(one, Difficulty::Hard).points, 2);

        let two = Correctness {
            song: true,
            artist: true,
            album: false,
        };
        let medium = score(two, Difficulty::Medium);
        assert_eq!((medium.points, medium.bonus), (3, 1));
        let hard = score(two, Difficulty::Hard);
        assert_eq!((hard.points, hard.bonus), (4, 2));
    }

    #[test]
    fn album_guess_must_match_when_card_has_album() {
        let card = card(Difficulty::Hard, Some("Canción Animal"));
        let result = score_guess(
            &card,
            &Guess {
                song: Some("De musica ligera"),
                artist: Some("soda stereo"),
                album: Some("cancion animal"),
            },
        );
        assert_eq!(result.points, 6);

        let missing_album = score_guess(
            &card,
            &Guess {
                song: Some("De musica ligera"),
                artist: Some("soda stereo"),
                album: None,
            },
        );
        assert!(!missing_album.correctness.album);
        assert_eq!(missing_album.points, 4);
    }

    #[test]
    fn self_report_is_taken_at_face_value() {
        let card = card(Difficulty::Easy, Some("Canción Animal"));
        let result = score_self_report(
            &card,
            SelfReport {
                song_knew: true,
                artist_knew: false,
                album_knew: true,
            },
        );
        assert!(result.correctness.song && result.correctness.album);
        assert_eq!(result.points, 2);
    }
}
