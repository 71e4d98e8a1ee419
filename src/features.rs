//! The feature contract: the 19 named inputs a churn model consumes
//!
//! `CustomerRecord` is the typed public shape of one customer. `FeatureMap`
//! is the loosely typed interchange shape (JSON objects, form answers) that
//! the predictor reindexes against the contract.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Binary numeric target column in the training data.
pub const TARGET_COLUMN: &str = "Churn Value";

/// Kind of a contract feature. Partitioning is by declared kind, never by
/// inspecting values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

/// Ordered feature contract.
pub const FEATURE_CONTRACT: [(&str, FeatureKind); 19] = [
    ("Gender", FeatureKind::Categorical),
    ("Senior Citizen", FeatureKind::Categorical),
    ("Partner", FeatureKind::Categorical),
    ("Dependents", FeatureKind::Categorical),
    ("Tenure Months", FeatureKind::Numeric),
    ("Phone Service", FeatureKind::Categorical),
    ("Multiple Lines", FeatureKind::Categorical),
    ("Internet Service", FeatureKind::Categorical),
    ("Online Security", FeatureKind::Categorical),
    ("Online Backup", FeatureKind::Categorical),
    ("Device Protection", FeatureKind::Categorical),
    ("Tech Support", FeatureKind::Categorical),
    ("Streaming TV", FeatureKind::Categorical),
    ("Streaming Movies", FeatureKind::Categorical),
    ("Contract", FeatureKind::Categorical),
    ("Paperless Billing", FeatureKind::Categorical),
    ("Payment Method", FeatureKind::Categorical),
    ("Monthly Charges", FeatureKind::Numeric),
    ("Total Charges", FeatureKind::Numeric),
];

/// Contract column names in order.
pub fn feature_columns() -> Vec<String> {
    FEATURE_CONTRACT
        .iter()
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Declared kind of a contract feature, `None` for names outside the contract.
pub fn feature_kind(name: &str) -> Option<FeatureKind> {
    FEATURE_CONTRACT
        .iter()
        .find(|(column, _)| *column == name)
        .map(|(_, kind)| *kind)
}

/// A scalar feature value as it arrives from JSON or a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
    /// JSON booleans; read as `"Yes"`/`"No"` for categories and 1/0 for numbers.
    Flag(bool),
}

impl FeatureValue {
    /// Numeric reading; text that does not parse to a finite number counts
    /// as missing.
    pub fn as_number(&self) -> Option<f64> {
        let value = match self {
            FeatureValue::Number(value) => Some(*value),
            FeatureValue::Text(text) => text.trim().parse::<f64>().ok(),
            FeatureValue::Flag(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        };
        value.filter(|v| v.is_finite())
    }

    /// Categorical reading. Whole numbers render without a fraction so
    /// `1.0` and `"1"` name the same category.
    pub fn as_text(&self) -> String {
        match self {
            FeatureValue::Text(text) => text.clone(),
            FeatureValue::Number(value) if value.fract() == 0.0 && value.is_finite() => {
                format!("{}", *value as i64)
            }
            FeatureValue::Number(value) => value.to_string(),
            FeatureValue::Flag(true) => "Yes".to_string(),
            FeatureValue::Flag(false) => "No".to_string(),
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Text(value.to_string())
    }
}

impl From<bool> for FeatureValue {
    fn from(value: bool) -> Self {
        FeatureValue::Flag(value)
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Number(value)
    }
}

/// Feature name to value; `None` marks an explicitly missing value.
pub type FeatureMap = BTreeMap<String, Option<FeatureValue>>;

macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:tt),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            /// Allowed values, in display order.
            pub const CHOICES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "'{}' is not one of {:?}",
                        other,
                        $name::CHOICES
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

choice_enum!(Gender { Male => "Male", Female => "Female" });

choice_enum!(YesNo { Yes => "Yes", No => "No" });

choice_enum!(MultipleLines {
    Yes => "Yes",
    No => "No",
    NoPhoneService => "No phone service",
});

choice_enum!(InternetService {
    Dsl => "DSL",
    FiberOptic => "Fiber optic",
    No => "No",
});

choice_enum!(
    /// Online Security, Online Backup, Device Protection, Tech Support and
    /// the two streaming services.
    InternetAddOn {
        Yes => "Yes",
        No => "No",
        NoInternetService => "No internet service",
    }
);

choice_enum!(Contract {
    MonthToMonth => "Month-to-month",
    OneYear => "One year",
    TwoYear => "Two year",
});

choice_enum!(PaymentMethod {
    ElectronicCheck => "Electronic check",
    MailedCheck => "Mailed check",
    BankTransfer => "Bank transfer (automatic)",
    CreditCard => "Credit card (automatic)",
});

/// Allowed values for a categorical contract feature.
pub fn categorical_choices(name: &str) -> Option<&'static [&'static str]> {
    let choices = match name {
        "Gender" => Gender::CHOICES,
        "Senior Citizen" | "Partner" | "Dependents" | "Phone Service" | "Paperless Billing" => {
            YesNo::CHOICES
        }
        "Multiple Lines" => MultipleLines::CHOICES,
        "Internet Service" => InternetService::CHOICES,
        "Online Security" | "Online Backup" | "Device Protection" | "Tech Support"
        | "Streaming TV" | "Streaming Movies" => InternetAddOn::CHOICES,
        "Contract" => Contract::CHOICES,
        "Payment Method" => PaymentMethod::CHOICES,
        _ => return None,
    };
    Some(choices)
}

/// One customer, field-for-field the feature contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    #[serde(rename = "Gender")]
    pub gender: Gender,
    #[serde(rename = "Senior Citizen")]
    pub senior_citizen: YesNo,
    #[serde(rename = "Partner")]
    pub partner: YesNo,
    #[serde(rename = "Dependents")]
    pub dependents: YesNo,
    #[serde(rename = "Tenure Months")]
    pub tenure_months: u32,
    #[serde(rename = "Phone Service")]
    pub phone_service: YesNo,
    #[serde(rename = "Multiple Lines")]
    pub multiple_lines: MultipleLines,
    #[serde(rename = "Internet Service")]
    pub internet_service: InternetService,
    #[serde(rename = "Online Security")]
    pub online_security: InternetAddOn,
    #[serde(rename = "Online Backup")]
    pub online_backup: InternetAddOn,
    #[serde(rename = "Device Protection")]
    pub device_protection: InternetAddOn,
    #[serde(rename = "Tech Support")]
    pub tech_support: InternetAddOn,
    #[serde(rename = "Streaming TV")]
    pub streaming_tv: InternetAddOn,
    #[serde(rename = "Streaming Movies")]
    pub streaming_movies: InternetAddOn,
    #[serde(rename = "Contract")]
    pub contract: Contract,
    #[serde(rename = "Paperless Billing")]
    pub paperless_billing: YesNo,
    #[serde(rename = "Payment Method")]
    pub payment_method: PaymentMethod,
    #[serde(rename = "Monthly Charges")]
    pub monthly_charges: f64,
    #[serde(rename = "Total Charges", default)]
    pub total_charges: Option<f64>,
}

impl CustomerRecord {
    /// A month-to-month fiber customer one year in; handy for smoke runs.
    pub fn example() -> Self {
        CustomerRecord {
            gender: Gender::Female,
            senior_citizen: YesNo::No,
            partner: YesNo::Yes,
            dependents: YesNo::No,
            tenure_months: 12,
            phone_service: YesNo::Yes,
            multiple_lines: MultipleLines::No,
            internet_service: InternetService::FiberOptic,
            online_security: InternetAddOn::No,
            online_backup: InternetAddOn::Yes,
            device_protection: InternetAddOn::No,
            tech_support: InternetAddOn::No,
            streaming_tv: InternetAddOn::Yes,
            streaming_movies: InternetAddOn::Yes,
            contract: Contract::MonthToMonth,
            paperless_billing: YesNo::Yes,
            payment_method: PaymentMethod::ElectronicCheck,
            monthly_charges: 70.35,
            total_charges: Some(845.5),
        }
    }

    /// Loosely typed view keyed by contract column names.
    pub fn to_feature_map(&self) -> FeatureMap {
        let text = |value: &str| Some(FeatureValue::from(value));
        let mut map = FeatureMap::new();
        map.insert("Gender".into(), text(self.gender.as_str()));
        map.insert("Senior Citizen".into(), text(self.senior_citizen.as_str()));
        map.insert("Partner".into(), text(self.partner.as_str()));
        map.insert("Dependents".into(), text(self.dependents.as_str()));
        map.insert(
            "Tenure Months".into(),
            Some(FeatureValue::Number(f64::from(self.tenure_months))),
        );
        map.insert("Phone Service".into(), text(self.phone_service.as_str()));
        map.insert("Multiple Lines".into(), text(self.multiple_lines.as_str()));
        map.insert("Internet Service".into(), text(self.internet_service.as_str()));
        map.insert("Online Security".into(), text(self.online_security.as_str()));
        map.insert("Online Backup".into(), text(self.online_backup.as_str()));
        map.insert("Device Protection".into(), text(self.device_protection.as_str()));
        map.insert("Tech Support".into(), text(self.tech_support.as_str()));
        map.insert("Streaming TV".into(), text(self.streaming_tv.as_str()));
        map.insert("Streaming Movies".into(), text(self.streaming_movies.as_str()));
        map.insert("Contract".into(), text(self.contract.as_str()));
        map.insert("Paperless Billing".into(), text(self.paperless_billing.as_str()));
        map.insert("Payment Method".into(), text(self.payment_method.as_str()));
        map.insert(
            "Monthly Charges".into(),
            Some(FeatureValue::Number(self.monthly_charges)),
        );
        map.insert(
            "Total Charges".into(),
            self.total_charges.map(FeatureValue::Number),
        );
        map
    }
}
