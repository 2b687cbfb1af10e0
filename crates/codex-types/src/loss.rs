use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Fidelity tier of a conversion.
///
/// Ordered from most to least faithful: `L0 < L1 < L2 < L3`. Each class
/// guarantees strictly less than the one before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LossClass {
    /// Bit-exact: reconstructable byte-for-byte by raw replay.
    L0,
    /// Semantically lossless: every structural element survives, bytes may differ.
    L1,
    /// Partial: most text survives; dropped structure is named.
    L2,
    /// Lossy: only plain text is reliable.
    L3,
}

impl LossClass {
    /// The lower-fidelity of `self` and `other`. Never upgrades.
    pub fn downgrade(self, other: LossClass) -> LossClass {
        self.max(other)
    }

    pub fn is_lossless(self) -> bool {
        self == LossClass::L0
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::L0 => "L0",
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::L0 => "bit-exact",
            Self::L1 => "semantically lossless",
            Self::L2 => "partial",
            Self::L3 => "lossy",
        }
    }
}

impl fmt::Display for LossClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LossClass {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L0" => Ok(Self::L0),
            "L1" => Ok(Self::L1),
            "L2" => Ok(Self::L2),
            "L3" => Ok(Self::L3),
            _ => Err(TypeError::InvalidLossClass(s.to_string())),
        }
    }
}

/// Element type recorded when only the exact byte layout is lost.
pub const BYTE_SERIALIZATION: &str = "byte_serialization";

/// One piece of information that did not survive a conversion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostElement {
    /// Location of the element in the source (format-specific path).
    pub path: String,
    pub element_type: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_value: Option<String>,
}

impl LostElement {
    pub fn new(
        path: impl Into<String>,
        element_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            element_type: element_type.into(),
            reason: reason.into(),
            original_value: None,
        }
    }

    pub fn with_original(mut self, value: impl Into<String>) -> Self {
        self.original_value = Some(value.into());
        self
    }
}

/// What a single `extract-ir` or `emit-native` call lost.
///
/// Invariant: `lost_elements` is empty if and only if `loss_class` is `L0`.
/// Use [`LossReport::record`] to add losses and [`LossReport::finalize`]
/// before handing a report out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossReport {
    pub source_format: String,
    pub target_format: String,
    pub loss_class: LossClass,
    #[serde(default)]
    pub lost_elements: Vec<LostElement>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl LossReport {
    /// A report that starts out bit-exact.
    pub fn lossless(source_format: impl Into<String>, target_format: impl Into<String>) -> Self {
        Self {
            source_format: source_format.into(),
            target_format: target_format.into(),
            loss_class: LossClass::L0,
            lost_elements: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Record a lost element and downgrade to at least `class`.
    pub fn record(&mut self, element: LostElement, class: LossClass) {
        self.lost_elements.push(element);
        self.downgrade(class);
    }

    /// Downgrade without naming an element (the element is added on
    /// [`finalize`](Self::finalize) if nothing else is recorded).
    pub fn downgrade(&mut self, class: LossClass) {
        self.loss_class = self.loss_class.downgrade(class);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Enforce the emptiness invariant.
    ///
    /// A report above `L0` with nothing named gains a single
    /// [`BYTE_SERIALIZATION`] element; an `L0` report with elements is
    /// downgraded to `L1`.
    pub fn finalize(mut self) -> Self {
        if self.loss_class.is_lossless() && !self.lost_elements.is_empty() {
            self.loss_class = LossClass::L1;
        }
        if !self.loss_class.is_lossless() && self.lost_elements.is_empty() {
            self.lost_elements.push(LostElement::new(
                "/",
                BYTE_SERIALIZATION,
                "output is re-synthesized from the structured IR; byte layout differs from the source",
            ));
        }
        self
    }

    /// Check the emptiness invariant without changing the report.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.loss_class.is_lossless() != self.lost_elements.is_empty() {
            return Err(TypeError::InvalidLossClass(format!(
                "{} report with {} lost elements",
                self.loss_class,
                self.lost_elements.len()
            )));
        }
        Ok(())
    }
}
