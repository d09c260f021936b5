//! Presentational text and avatars. Every pick draws from the flavor stream,
//! never from the outcome stream.

use core_entropy::Entropy;

pub const INTRO: &str = "Summoning the racers...";
pub const GO: &str = "LET HIM COOK! GO!";

pub const LOADING_TEXTS: [&str; 5] = [
    "Cooking the results...",
    "Querying the vibe council...",
    "Checking if it's bussing...",
    "Mogging the menu...",
    "Consulting the lunch oracle...",
];

pub const MISHAPS: [&str; 8] = [
    "tripped on a banana!",
    "stopped to post a TikTok.",
    "is literally mogging everyone.",
    "got distracted by a squirrel.",
    "activated turbo mode!",
    "is cooking (literally).",
    "forgot the stove was on.",
    "saw a ghost!",
];

pub const AVATARS: [&str; 8] = ["🐶", "🐸", "😺", "👽", "🦄", "🤡", "🤖", "💩"];

pub const WINNER_QUOTES: [&str; 8] = [
    "ABSOLUTE CINEMA",
    "NO CAP BUSSIN",
    "WINNER WINNER CHICKEN DINNER",
    "THE CHOSEN ONE",
    "MAIN CHARACTER ENERGY",
    "WE ARE SO BACK",
    "SHEEEEEESH",
    "GG EZ CLAP",
];

fn pick<'a>(entropy: &mut dyn Entropy, items: &[&'a str]) -> &'a str {
    items[entropy.uniform_int(items.len())]
}

pub fn loading_text(entropy: &mut dyn Entropy) -> &'static str {
    pick(entropy, &LOADING_TEXTS)
}

pub fn winner_quote(entropy: &mut dyn Entropy) -> &'static str {
    pick(entropy, &WINNER_QUOTES)
}

pub fn boost_line(title: &str) -> String {
    format!("{title} goes SUPER SAIYAN!")
}

pub fn setback_line(title: &str, entropy: &mut dyn Entropy) -> String {
    format!("{title} {}", pick(entropy, &MISHAPS))
}

pub fn winner_line(title: &str) -> String {
    format!("{title} IS THE GOAT!")
}

/// One random avatar per racer (repeats allowed).
pub fn avatars(racers: usize, entropy: &mut dyn Entropy) -> Vec<&'static str> {
    (0..racers).map(|_| pick(entropy, &AVATARS)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_entropy::ScriptedEntropy;

    #[test]
    fn picks_follow_draws() {
        let mut e = ScriptedEntropy::cycle([0.0, 0.99]);
        assert_eq!(loading_text(&mut e), LOADING_TEXTS[0]);
        assert_eq!(loading_text(&mut e), LOADING_TEXTS[4]);
        assert_eq!(setback_line("Taco Town", &mut e), "Taco Town tripped on a banana!");
    }

    #[test]
    fn avatars_one_per_racer() {
        let mut e = ScriptedEntropy::cycle([0.5]);
        assert_eq!(avatars(3, &mut e), vec!["🦄"; 3]);
    }

    #[test]
    fn fixed_lines() {
        assert_eq!(boost_line("A"), "A goes SUPER SAIYAN!");
        assert_eq!(winner_line("A"), "A IS THE GOAT!");
    }
}
