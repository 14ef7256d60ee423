/// Strips emoji and pictographic symbols, which the TTS backend cannot voice.
pub fn remove_emojis(text: &str) -> String {
    text.chars().filter(|c| !is_pictographic(*c)).collect()
}

fn is_pictographic(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF     // emoticons, symbols & pictographs, flags, transport
            | 0x2600..=0x27BF // misc symbols, dingbats
            | 0x2B00..=0x2BFF // arrows, stars
            | 0x2300..=0x23FF // technical (watch, hourglass)
            | 0xFE00..=0xFE0F // variation selectors
            | 0x200D          // zero-width joiner
            | 0x20E3          // keycap
            | 0xE0020..=0xE007F
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_pictographs_and_joiners() {
        assert_eq!(remove_emojis("Hola 👋🏽 amigo 👨‍👩‍👧!"), "Hola  amigo !");
        assert_eq!(remove_emojis("☀️ sunny"), " sunny");
    }

    #[test]
    fn keeps_letters_and_punctuation_of_every_script() {
        let text = "Привет, ¿qué tal? Grüße — done.";
        assert_eq!(remove_emojis(text), text);
    }
}
