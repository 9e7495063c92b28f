use crate::extractor::{Form, Input};
use serde::{Deserialize, Serialize};

/// Forms and formless inputs found on one rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub url: String,
    pub forms: Vec<Form>,
    pub independent_inputs: Vec<Input>,
}

impl ExtractionResult {
    pub fn new(url: String) -> Self {
        Self {
            url,
            forms: Vec::new(),
            independent_inputs: Vec::new(),
        }
    }

    /// Named formless inputs promoted to single-field GET forms against this page.
    ///
    /// The page may really submit these through client-side script; posting them
    /// back to the containing page with GET is an approximation.
    pub fn promoted_forms(&self) -> Vec<Form> {
        self.independent_inputs
            .iter()
            .filter(|input| input.is_named())
            .map(|input| Form::synthetic(self.url.clone(), input.clone()))
            .collect()
    }

    /// Every fuzzable form on the page, real forms first.
    pub fn fuzz_targets(&self) -> Vec<Form> {
        let mut targets: Vec<Form> = self
            .forms
            .iter()
            .filter(|f| f.is_fuzzable())
            .cloned()
            .collect();
        targets.extend(self.promoted_forms());
        targets
    }
}
