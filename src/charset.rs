// WHY: uploaded files carry no declared encoding; this module turns raw bytes
// into text without ever failing, preferring strict UTF-8, then the Chinese
// legacy encoding whose output looks most like Chinese, then a Japanese guess,
// then lossy UTF-8

use crate::config::DetectorConfig;
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, BIG5, EUC_JP, GB18030, GBK, ISO_2022_JP, SHIFT_JIS, UTF_8};
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::{debug, warn};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Closed set of encodings the detector can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectedEncoding {
    Utf8,
    Gbk,
    Gb18030,
    Big5,
    ShiftJis,
    EucJp,
    Iso2022Jp,
    /// Lossy UTF-8 decode after every other attempt failed
    Utf8Fallback,
}

impl DetectedEncoding {
    /// User-facing label
    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Gbk => "GBK",
            Self::Gb18030 => "GB18030",
            Self::Big5 => "Big5",
            Self::ShiftJis => "Shift_JIS",
            Self::EucJp => "EUC-JP",
            Self::Iso2022Jp => "ISO-2022-JP",
            Self::Utf8Fallback => "UTF-8 (fallback)",
        }
    }

    /// Map a Chinese legacy encoding to its label; anything else is not a candidate
    fn chinese_legacy(encoding: &'static Encoding) -> Option<Self> {
        if encoding == GBK {
            Some(Self::Gbk)
        } else if encoding == GB18030 {
            Some(Self::Gb18030)
        } else if encoding == BIG5 {
            Some(Self::Big5)
        } else {
            None
        }
    }

    fn japanese(encoding: &'static Encoding) -> Option<Self> {
        if encoding == SHIFT_JIS {
            Some(Self::ShiftJis)
        } else if encoding == EUC_JP {
            Some(Self::EucJp)
        } else if encoding == ISO_2022_JP {
            Some(Self::Iso2022Jp)
        } else {
            None
        }
    }
}

impl fmt::Display for DetectedEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for DetectedEncoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Decoded text plus the encoding it was decoded with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingDetectionResult {
    pub content: String,
    pub encoding: DetectedEncoding,
}

/// Scored decode of one legacy candidate
#[derive(Debug, Clone)]
struct ScoredCandidate {
    encoding: DetectedEncoding,
    content: String,
    score: f64,
}

/// Charset detector over untrusted byte buffers
#[derive(Debug, Clone)]
pub struct CharsetDetector {
    candidates: Vec<(&'static Encoding, DetectedEncoding)>,
    cjk_weight: f64,
    punct_weight: f64,
    control_weight: f64,
}

impl Default for CharsetDetector {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}

impl CharsetDetector {
    /// Build a detector from configuration; unknown or non-Chinese candidate
    /// labels are skipped with a warning
    pub fn new(config: &DetectorConfig) -> Self {
        let mut candidates = Vec::with_capacity(config.candidates.len());
        for label in &config.candidates {
            let resolved = Encoding::for_label(label.trim().as_bytes())
                .and_then(|enc| DetectedEncoding::chinese_legacy(enc).map(|det| (enc, det)));
            match resolved {
                Some(pair) if !candidates.contains(&pair) => candidates.push(pair),
                Some(_) => debug!("Skipping duplicate candidate encoding {label}"),
                None => warn!("Ignoring unsupported candidate encoding {label}"),
            }
        }

        Self {
            candidates,
            cjk_weight: config.cjk_weight,
            punct_weight: config.punct_weight,
            control_weight: config.control_weight,
        }
    }

    /// Decode `bytes`, never failing
    pub fn detect(&self, bytes: &[u8]) -> EncodingDetectionResult {
        if bytes.is_empty() {
            return EncodingDetectionResult {
                content: String::new(),
                encoding: DetectedEncoding::Utf8,
            };
        }

        if let Some(content) = decode_strict_utf8(bytes) {
            debug!(bytes = bytes.len(), "Input is valid UTF-8");
            return EncodingDetectionResult {
                content,
                encoding: DetectedEncoding::Utf8,
            };
        }

        if let Some(best) = self.best_legacy_candidate(bytes) {
            debug!(encoding = %best.encoding, score = best.score, "Selected legacy encoding");
            return EncodingDetectionResult {
                content: best.content,
                encoding: best.encoding,
            };
        }

        if let Some(result) = detect_secondary(bytes) {
            debug!(encoding = %result.encoding, "Secondary detector matched");
            return result;
        }

        warn!(bytes = bytes.len(), "No encoding matched, decoding as lossy UTF-8");
        let (content, _) = UTF_8.decode_without_bom_handling(strip_utf8_bom(bytes));
        EncodingDetectionResult {
            content: content.into_owned(),
            encoding: DetectedEncoding::Utf8Fallback,
        }
    }

    fn best_legacy_candidate(&self, bytes: &[u8]) -> Option<ScoredCandidate> {
        let mut best: Option<ScoredCandidate> = None;

        for &(encoding, detected) in &self.candidates {
            let (decoded, had_errors) = encoding.decode_without_bom_handling(bytes);
            if had_errors || decoded.contains('\u{FFFD}') {
                debug!(encoding = %detected, "Candidate produced replacement characters");
                continue;
            }

            let score = self.score(&decoded);
            debug!(encoding = %detected, score, "Scored candidate");

            // WHY: strict comparison keeps the earlier candidate on ties
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(ScoredCandidate {
                    encoding: detected,
                    content: decoded.into_owned(),
                    score,
                });
            }
        }

        best
    }

    /// Chinese-likelihood of decoded text
    pub fn score(&self, text: &str) -> f64 {
        let shape = TextShape::measure(text);
        self.cjk_weight * shape.cjk_ratio + self.punct_weight * shape.punct_ratio
            - self.control_weight * shape.control_ratio
    }
}

/// Character-class ratios used by the scoring heuristic
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextShape {
    pub cjk_ratio: f64,
    pub punct_ratio: f64,
    pub control_ratio: f64,
}

impl TextShape {
    pub fn measure(text: &str) -> Self {
        let mut total = 0usize;
        let mut cjk = 0usize;
        let mut punct = 0usize;
        let mut control = 0usize;

        for ch in text.chars() {
            total += 1;
            match ch {
                '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' => cjk += 1,
                '\u{3000}'..='\u{303F}' | '\u{FF00}'..='\u{FFEF}' => punct += 1,
                '\u{E000}'..='\u{F8FF}' => control += 1,
                c if c.is_control() && !c.is_whitespace() => control += 1,
                _ => {}
            }
        }

        if total == 0 {
            return Self::default();
        }

        let total = total as f64;
        Self {
            cjk_ratio: cjk as f64 / total,
            punct_ratio: punct as f64 / total,
            control_ratio: control as f64 / total,
        }
    }
}

fn strip_utf8_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

/// Strict UTF-8 decode; None on any ill-formed sequence
fn decode_strict_utf8(bytes: &[u8]) -> Option<String> {
    UTF_8
        .decode_without_bom_handling_and_without_replacement(strip_utf8_bom(bytes))
        .map(|text| text.into_owned())
}

/// Library-driven guess restricted to Japanese encodings
pub fn detect_secondary(bytes: &[u8]) -> Option<EncodingDetectionResult> {
    let mut detector = EncodingDetector::new();
    let _ = detector.feed(bytes, true);
    let guessed = detector.guess(None, false);

    let encoding = DetectedEncoding::japanese(guessed)?;
    let (decoded, had_errors) = guessed.decode_without_bom_handling(bytes);
    if had_errors {
        debug!(encoding = %encoding, "Secondary guess did not decode cleanly");
        return None;
    }

    Some(EncodingDetectionResult {
        content: decoded.into_owned(),
        encoding,
    })
}
