//! Input shaping applied before text goes to the TTS endpoint.
//!
//! The endpoint reads digits and short forms literally, and rejects long
//! inputs, so text is normalized, expanded and cut to one chunk first.

/// Common Indonesian short forms and what they should be read as.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("yg", "yang"),
    ("dgn", "dengan"),
    ("tdk", "tidak"),
    ("utk", "untuk"),
    ("sdh", "sudah"),
    ("blm", "belum"),
    ("krn", "karena"),
    ("bgmn", "bagaimana"),
    ("dll", "dan lain-lain"),
    ("dsb", "dan seterusnya"),
    ("tsb", "tersebut"),
    ("dpt", "dapat"),
    ("pd", "pada"),
    ("org", "orang"),
    ("spt", "seperti"),
    ("bbrp", "beberapa"),
    ("bnyk", "banyak"),
    ("skrg", "sekarang"),
    ("tgl", "tanggal"),
    ("bln", "bulan"),
    ("thn", "tahun"),
    ("jl", "jalan"),
    ("no", "nomor"),
    ("kg", "kilogram"),
    ("km", "kilometer"),
    ("cm", "sentimeter"),
    ("mm", "milimeter"),
    ("rp", "rupiah"),
    ("wib", "Waktu Indonesia Barat"),
    ("wit", "Waktu Indonesia Timur"),
    ("wita", "Waktu Indonesia Tengah"),
];

/// Indonesian month and day names, read as proper nouns.
const CALENDAR_NAMES: &[&str] = &[
    "januari", "februari", "maret", "april", "mei", "juni", "juli", "agustus", "september",
    "oktober", "november", "desember", "senin", "selasa", "rabu", "kamis", "jumat", "sabtu",
    "minggu",
];

/// Words per minute used for the duration estimate.
const WORDS_PER_MINUTE: f64 = 150.0;

/// Full shaping pipeline for one request.
pub fn shape_text(text: &str, language_code: &str) -> String {
    let normalized = normalize_whitespace(text);
    let grouped = group_digits(&normalized);
    if language_code == "id" {
        capitalize_calendar_names(&expand_abbreviations(&grouped))
    } else {
        grouped
    }
}

/// Trim and collapse every whitespace run to one space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Group digits of numbers >= 1000 in threes with `.` (1500000 -> 1.500.000).
pub fn group_digits(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 3);
    let mut run = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            run.push(ch);
            continue;
        }
        flush_digits(&mut run, &mut out);
        out.push(ch);
    }
    flush_digits(&mut run, &mut out);
    out
}

fn flush_digits(run: &mut String, out: &mut String) {
    if run.is_empty() {
        return;
    }
    let significant = run.trim_start_matches('0').len();
    if significant < 4 {
        out.push_str(run);
    } else {
        let n = run.len();
        for (i, digit) in run.chars().enumerate() {
            if i > 0 && (n - i) % 3 == 0 {
                out.push('.');
            }
            out.push(digit);
        }
    }
    run.clear();
}

/// Expand whole-word abbreviations, keeping the case shape of the original
/// (`yg` -> `yang`, `Yg` -> `Yang`, `YG` -> `YANG`). `dr.` becomes `dokter`.
pub fn expand_abbreviations(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if !is_word_char(chars[i]) {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && is_word_char(chars[i]) {
            i += 1;
        }
        let word: String = chars[start..i].iter().collect();
        let lower = word.to_lowercase();

        if lower == "dr" && chars.get(i) == Some(&'.') {
            out.push_str(&match_case(&word, "dokter"));
            i += 1;
            continue;
        }
        match ABBREVIATIONS.iter().find(|(abbr, _)| *abbr == lower) {
            Some((_, expansion)) => out.push_str(&match_case(&word, expansion)),
            None => out.push_str(&word),
        }
    }
    out
}

/// Capitalize whole-word month and day names (`senin` -> `Senin`).
pub fn capitalize_calendar_names(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();
    for ch in text.chars() {
        if is_word_char(ch) {
            word.push(ch);
        } else {
            flush_calendar_word(&mut word, &mut out);
            out.push(ch);
        }
    }
    flush_calendar_word(&mut word, &mut out);
    out
}

fn flush_calendar_word(word: &mut String, out: &mut String) {
    let lower = word.to_lowercase();
    if CALENDAR_NAMES.contains(&lower.as_str()) {
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    } else {
        out.push_str(word);
    }
    word.clear();
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn match_case(original: &str, replacement: &str) -> String {
    if original == original.to_uppercase() {
        return replacement.to_uppercase();
    }
    let starts_upper = original.chars().next().is_some_and(char::is_uppercase);
    if !starts_upper {
        return replacement.to_string();
    }
    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Cut to at most `max` characters plus an ellipsis. Prefers a sentence end
/// in the back half, then a clause end past 40%, then a word boundary past
/// 30%; otherwise cuts hard.
pub fn truncate(text: &str, max: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max {
        return text.to_string();
    }
    let head = &chars[..max];
    let last_pair = |pair: [char; 2]| -> Option<usize> { head.windows(2).rposition(|w| w == pair) };
    let limit = max as f64;
    let reaches = |pos: Option<usize>, share: f64| pos.is_some_and(|p| p as f64 >= limit * share);

    let mut best = [['.', ' '], ['?', ' '], ['!', ' ']]
        .into_iter()
        .filter_map(last_pair)
        .max();
    if !reaches(best, 0.5) {
        best = [[',', ' '], [';', ' ']].into_iter().filter_map(last_pair).max();
        if !reaches(best, 0.4) {
            let space = head.iter().rposition(|c| *c == ' ');
            if space.is_some_and(|p| p as f64 > limit * 0.3) {
                best = space;
            }
        }
    }

    let mut out: String = match best {
        Some(end) if end > 0 => head[..=end].iter().collect(),
        _ => head.iter().collect(),
    };
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if !out.ends_with('.') {
        out.push('.');
    }
    out.push_str("..");
    out
}

/// Endpoint language code for a client language tag. Unknown tags fall back
/// to Indonesian.
pub fn map_language_code(language: &str) -> &'static str {
    match language {
        "id-ID" | "id" => "id",
        "en-US" | "en" => "en",
        "ja-JP" | "ja" => "ja",
        "ko-KR" | "ko" => "ko",
        _ => "id",
    }
}

/// Spoken length in seconds at 150 words per minute, clamped to [1, 30].
pub fn estimate_duration(text: &str) -> f64 {
    let words = text.split_whitespace().count().max(1) as f64;
    let secs = (words / WORDS_PER_MINUTE * 60.0 * 100.0).round() / 100.0;
    secs.clamp(1.0, 30.0)
}
