//! Interactive terminal form collecting the 19 contract features

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::ChurnError;
use crate::features::{
    categorical_choices, FeatureKind, FeatureMap, FeatureValue, FEATURE_CONTRACT,
};
use crate::predict::{ChurnPredictor, Prediction, PredictionLabel};

/// One form input.
#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    /// Pick one of a fixed list; the first entry is the default.
    Choice {
        name: &'static str,
        choices: &'static [&'static str],
    },
    /// Bounded number with a default.
    Number {
        name: &'static str,
        min: f64,
        max: f64,
        default: f64,
        integer: bool,
    },
}

impl FormField {
    pub fn name(&self) -> &'static str {
        match self {
            FormField::Choice { name, .. } | FormField::Number { name, .. } => *name,
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            FormField::Choice { name, choices } => {
                let options: Vec<String> = choices
                    .iter()
                    .enumerate()
                    .map(|(i, choice)| format!("{}) {}", i + 1, choice))
                    .collect();
                format!("{} [{}] (default {}): ", name, options.join(", "), choices[0])
            }
            FormField::Number {
                name,
                min,
                max,
                default,
                ..
            } => format!("{name} ({min}-{max}, default {default}): "),
        }
    }

    /// Validate an answer. Empty input takes the default; choices accept
    /// their number or their text (case-insensitive).
    pub fn parse_answer(&self, input: &str) -> Result<FeatureValue, String> {
        let input = input.trim();
        match self {
            FormField::Choice { choices, .. } => {
                if input.is_empty() {
                    return Ok(FeatureValue::from(choices[0]));
                }
                if let Ok(index) = input.parse::<usize>() {
                    return choices
                        .get(index.wrapping_sub(1))
                        .map(|choice| FeatureValue::from(*choice))
                        .ok_or_else(|| format!("pick a number between 1 and {}", choices.len()));
                }
                choices
                    .iter()
                    .find(|choice| choice.eq_ignore_ascii_case(input))
                    .map(|choice| FeatureValue::from(*choice))
                    .ok_or_else(|| format!("choose one of: {}", choices.join(", ")))
            }
            FormField::Number {
                min,
                max,
                default,
                integer,
                ..
            } => {
                if input.is_empty() {
                    return Ok(FeatureValue::Number(*default));
                }
                let value: f64 = input
                    .parse()
                    .map_err(|_| format!("'{input}' is not a number"))?;
                if !(*min..=*max).contains(&value) {
                    return Err(format!("enter a value between {min} and {max}"));
                }
                if *integer && value.fract() != 0.0 {
                    return Err("enter a whole number".to_string());
                }
                Ok(FeatureValue::Number(value))
            }
        }
    }
}

/// The form's inputs in contract order, with the bounds of the web form this
/// replaces.
pub fn form_fields() -> Vec<FormField> {
    FEATURE_CONTRACT
        .iter()
        .map(|&(name, kind)| match kind {
            FeatureKind::Categorical => FormField::Choice {
                name,
                choices: categorical_choices(name).unwrap_or(&[]),
            },
            FeatureKind::Numeric => match name {
                "Tenure Months" => FormField::Number {
                    name,
                    min: 0.0,
                    max: 100.0,
                    default: 12.0,
                    integer: true,
                },
                "Monthly Charges" => FormField::Number {
                    name,
                    min: 0.0,
                    max: 500.0,
                    default: 70.0,
                    integer: false,
                },
                _ => FormField::Number {
                    name,
                    min: 0.0,
                    max: 10_000.0,
                    default: 1500.0,
                    integer: false,
                },
            },
        })
        .collect()
}

/// Ask every field in turn, re-asking until the answer is valid.
///
/// `read_line` returns `Ok(None)` when the user abandons the form, in which
/// case this returns `Ok(None)` too.
pub fn fill_form<R>(mut read_line: R) -> crate::Result<Option<FeatureMap>>
where
    R: FnMut(&str) -> crate::Result<Option<String>>,
{
    let mut answers = FeatureMap::new();
    for field in form_fields() {
        loop {
            let Some(line) = read_line(&field.prompt())? else {
                return Ok(None);
            };
            match field.parse_answer(&line) {
                Ok(value) => {
                    answers.insert(field.name().to_string(), Some(value));
                    break;
                }
                Err(message) => println!("  {message}"),
            }
        }
    }
    Ok(Some(answers))
}

/// Human-readable verdict. A stay verdict quotes the retention probability.
pub fn verdict(prediction: &Prediction) -> String {
    match prediction.label {
        PredictionLabel::Yes => format!(
            "Customer is likely to CHURN with probability {:.2}",
            prediction.probability
        ),
        PredictionLabel::No => format!(
            "Customer is likely to STAY with probability {:.2}",
            1.0 - prediction.probability
        ),
        PredictionLabel::ModelNotLoaded => {
            "Error: the churn model is not loaded; run `churnforge train` first".to_string()
        }
    }
}

/// Run the form on the terminal and print the verdict.
pub fn run_form(predictor: &ChurnPredictor) -> crate::Result<()> {
    let mut editor = DefaultEditor::new().map_err(|e| ChurnError::Input(e.to_string()))?;

    println!("Telco Customer Churn Prediction");
    println!("Fill the details below to predict whether a customer will churn.");
    println!("Press Enter to accept a default, Ctrl-D to quit.\n");

    let answers = fill_form(|prompt| match editor.readline(prompt) {
        Ok(line) => Ok(Some(line)),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(e) => Err(ChurnError::Input(e.to_string())),
    })?;

    match answers {
        Some(answers) => {
            let prediction = predictor.predict_features(&answers);
            println!("\n{}", verdict(&prediction));
        }
        None => println!("\nForm cancelled."),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[test]
    fn test_fields_follow_contract() {
        let fields = form_fields();
        assert_eq!(fields.len(), 19);
        assert_eq!(fields[0].name(), "Gender");
        assert!(matches!(
            fields[4],
            FormField::Number { name: "Tenure Months", integer: true, .. }
        ));
        for field in &fields {
            if let FormField::Choice { choices, .. } = field {
                assert!(!choices.is_empty(), "{}", field.name());
            }
        }
    }

    #[test]
    fn test_choice_answers() {
        let field = FormField::Choice {
            name: "Contract",
            choices: &["Month-to-month", "One year", "Two year"],
        };
        assert_eq!(field.parse_answer(""), Ok(FeatureValue::from("Month-to-month")));
        assert_eq!(field.parse_answer("3"), Ok(FeatureValue::from("Two year")));
        assert_eq!(field.parse_answer("one YEAR"), Ok(FeatureValue::from("One year")));
        assert!(field.parse_answer("0").is_err());
        assert!(field.parse_answer("4").is_err());
        assert!(field.parse_answer("Three year").is_err());
    }

    #[test]
    fn test_number_answers() {
        let field = FormField::Number {
            name: "Tenure Months",
            min: 0.0,
            max: 100.0,
            default: 12.0,
            integer: true,
        };
        assert_eq!(field.parse_answer(""), Ok(FeatureValue::Number(12.0)));
        assert_eq!(field.parse_answer(" 24 "), Ok(FeatureValue::Number(24.0)));
        assert!(field.parse_answer("101").is_err());
        assert!(field.parse_answer("2.5").is_err());
        assert!(field.parse_answer("soon").is_err());
    }

    #[test]
    fn test_fill_form_retries_invalid_answers() {
        let mut script: VecDeque<&str> = VecDeque::from(vec!["Robot", "2"]);
        let answers = fill_form(|_prompt| Ok(Some(script.pop_front().unwrap_or("").to_string())))
            .unwrap()
            .unwrap();

        assert_eq!(answers.len(), 19);
        assert_eq!(answers["Gender"], Some(FeatureValue::from("Female")));
        assert_eq!(answers["Tenure Months"], Some(FeatureValue::Number(12.0)));
        assert_eq!(answers["Total Charges"], Some(FeatureValue::Number(1500.0)));
    }

    #[test]
    fn test_fill_form_can_be_cancelled() {
        let mut calls = 0;
        let answers = fill_form(|_prompt| {
            calls += 1;
            Ok(if calls < 3 { Some(String::new()) } else { None })
        })
        .unwrap();
        assert!(answers.is_none());
    }

    #[test]
    fn test_verdict_wording() {
        let churn = Prediction {
            label: PredictionLabel::Yes,
            probability: 0.8123,
        };
        assert_eq!(verdict(&churn), "Customer is likely to CHURN with probability 0.81");

        let stay = Prediction {
            label: PredictionLabel::No,
            probability: 0.25,
        };
        assert_eq!(verdict(&stay), "Customer is likely to STAY with probability 0.75");
        assert!(verdict(&Prediction::model_not_loaded()).starts_with("Error"));
    }
}
