//! Seven-way facial expression taxonomy.
//!
//! The detector reports one score per expression. A face is classified by
//! testing the scores in a fixed priority order against a single threshold;
//! the first expression whose score exceeds the threshold wins, even when a
//! lower-priority expression scored higher.

use serde::{Deserialize, Serialize};

use crate::config::Locale;

/// Score an expression must strictly exceed to be selected.
pub const EXPRESSION_THRESHOLD: f32 = 0.6;

// MARK: - Expression

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    Happy,
    Sad,
    Angry,
    Disgusted,
    Surprised,
    Fear,
    Neutral,
}

impl Expression {
    /// Classification priority, highest first.
    pub const PRIORITY: [Expression; 7] = [
        Expression::Happy,
        Expression::Sad,
        Expression::Angry,
        Expression::Disgusted,
        Expression::Surprised,
        Expression::Fear,
        Expression::Neutral,
    ];

    pub fn indicator(self) -> Indicator {
        let (border_class, emblem) = match self {
            Self::Happy => ("joy", "joy.png"),
            Self::Sad => ("sadness", "sadness.png"),
            Self::Angry => ("anger", "anger.png"),
            Self::Disgusted => ("disgust", "disgust.png"),
            Self::Surprised => ("embarrassment", "embarrassment.png"),
            Self::Fear => ("fear", "fear.png"),
            Self::Neutral => ("ennui", "ennui.png"),
        };
        Indicator { border_class, emblem }
    }

    pub fn label(self, locale: Locale) -> &'static str {
        match locale {
            Locale::English => match self {
                Self::Happy => "happy",
                Self::Sad => "sad",
                Self::Angry => "angry",
                Self::Disgusted => "disgusted",
                Self::Surprised => "embarrassment",
                Self::Fear => "fear",
                Self::Neutral => "neutral",
            },
            Locale::Korean => match self {
                Self::Happy => "태도: 행복",
                Self::Sad => "태도: 슬픔",
                Self::Angry => "태도: 분노",
                Self::Disgusted => "태도: 혐오",
                Self::Surprised => "태도: 당혹",
                Self::Fear => "태도: 두려움",
                Self::Neutral => "태도: 무표정",
            },
        }
    }

    /// RGB colour used for the overlay expression bar.
    pub fn color(self) -> [u8; 3] {
        match self {
            Self::Happy => [250, 200, 40],
            Self::Sad => [70, 120, 220],
            Self::Angry => [220, 50, 50],
            Self::Disgusted => [90, 170, 60],
            Self::Surprised => [240, 130, 170],
            Self::Fear => [140, 80, 190],
            Self::Neutral => [150, 150, 160],
        }
    }
}

/// Render an optional label; `None` is the empty label.
pub fn label_text(label: Option<Expression>, locale: Locale) -> &'static str {
    label.map_or("", |e| e.label(locale))
}

// MARK: - Indicator

/// Visual indicator shown on a tile: a border style and an emblem image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    pub border_class: &'static str,
    pub emblem: &'static str,
}

// MARK: - ExpressionScores

/// Per-expression probabilities for one face.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionScores {
    pub happy: f32,
    pub sad: f32,
    pub angry: f32,
    pub disgusted: f32,
    pub surprised: f32,
    pub fear: f32,
    pub neutral: f32,
}

impl ExpressionScores {
    pub fn score(&self, expression: Expression) -> f32 {
        match expression {
            Expression::Happy => self.happy,
            Expression::Sad => self.sad,
            Expression::Angry => self.angry,
            Expression::Disgusted => self.disgusted,
            Expression::Surprised => self.surprised,
            Expression::Fear => self.fear,
            Expression::Neutral => self.neutral,
        }
    }

    /// Highest-scoring expression regardless of priority.
    pub fn dominant(&self) -> (Expression, f32) {
        Expression::PRIORITY
            .iter()
            .map(|e| (*e, self.score(*e)))
            .fold((Expression::Neutral, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best })
    }
}

// MARK: - Classification

pub fn classify(scores: &ExpressionScores) -> Option<Expression> {
    classify_with_threshold(scores, EXPRESSION_THRESHOLD)
}

pub fn classify_with_threshold(scores: &ExpressionScores, threshold: f32) -> Option<Expression> {
    Expression::PRIORITY
        .into_iter()
        .find(|e| scores.score(*e) > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_beats_higher_score() {
        let scores = ExpressionScores { happy: 0.7, sad: 0.9, ..Default::default() };
        assert_eq!(classify(&scores), Some(Expression::Happy));
    }

    #[test]
    fn each_expression_wins_when_alone_above_threshold() {
        for expression in Expression::PRIORITY {
            let mut scores = ExpressionScores::default();
            match expression {
                Expression::Happy => scores.happy = 0.61,
                Expression::Sad => scores.sad = 0.61,
                Expression::Angry => scores.angry = 0.61,
                Expression::Disgusted => scores.disgusted = 0.61,
                Expression::Surprised => scores.surprised = 0.61,
                Expression::Fear => scores.fear = 0.61,
                Expression::Neutral => scores.neutral = 0.61,
            }
            assert_eq!(classify(&scores), Some(expression));
        }
    }

    #[test]
    fn threshold_is_strict() {
        let scores = ExpressionScores {
            happy: 0.6,
            sad: 0.6,
            angry: 0.6,
            disgusted: 0.6,
            surprised: 0.6,
            fear: 0.6,
            neutral: 0.6,
        };
        assert_eq!(classify(&scores), None);
        assert_eq!(label_text(classify(&scores), Locale::English), "");
    }

    #[test]
    fn fear_outranks_neutral_but_not_surprise() {
        let scores = ExpressionScores { fear: 0.65, neutral: 0.95, ..Default::default() };
        assert_eq!(classify(&scores), Some(Expression::Fear));

        let scores = ExpressionScores { surprised: 0.62, fear: 0.99, ..Default::default() };
        assert_eq!(classify(&scores), Some(Expression::Surprised));
    }

    #[test]
    fn surprise_is_labelled_embarrassment() {
        assert_eq!(Expression::Surprised.label(Locale::English), "embarrassment");
        assert_eq!(Expression::Surprised.indicator().border_class, "embarrassment");
        assert_eq!(Expression::Surprised.label(Locale::Korean), "태도: 당혹");
    }

    #[test]
    fn neutral_uses_ennui_indicator() {
        let indicator = Expression::Neutral.indicator();
        assert_eq!(indicator.border_class, "ennui");
        assert_eq!(indicator.emblem, "ennui.png");
    }

    #[test]
    fn custom_threshold_is_respected() {
        let scores = ExpressionScores { sad: 0.45, ..Default::default() };
        assert_eq!(classify_with_threshold(&scores, 0.4), Some(Expression::Sad));
        assert_eq!(classify(&scores), None);
    }

    #[test]
    fn dominant_ignores_priority() {
        let scores = ExpressionScores { happy: 0.7, sad: 0.9, ..Default::default() };
        assert_eq!(scores.dominant(), (Expression::Sad, 0.9));
    }

    #[test]
    fn scores_parse_with_missing_fields() {
        let scores: ExpressionScores = serde_json::from_str(r#"{"happy": 0.8}"#).unwrap();
        assert_eq!(scores.happy, 0.8);
        assert_eq!(scores.neutral, 0.0);
    }
}
