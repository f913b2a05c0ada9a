use anyhow::{bail, Context};
use tailfold::{
    fixtures::{self, Expectation, Fixture, FIXTURES},
    ir::{Constant, Function},
};

/// Look up a fixture by name, listing the valid names on failure.
pub fn resolve_fixture(name: &str) -> anyhow::Result<&'static Fixture> {
    fixtures::find(name).with_context(|| {
        let names: Vec<_> = FIXTURES.iter().map(|f| f.name).collect();
        format!("unknown fixture '{name}' (available: {})", names.join(", "))
    })
}

/// Convert raw integers to constants of the parameter types of `func`.
pub fn convert_args(func: &Function, raw: &[i64]) -> anyhow::Result<Vec<Constant>> {
    if raw.len() != func.params().len() {
        bail!(
            "{} takes {} arguments, {} given",
            func.name(),
            func.params().len(),
            raw.len()
        );
    }

    func.params()
        .iter()
        .zip(raw)
        .map(|(&param, &value)| {
            let ty = func
                .value(param)
                .map(|data| data.ty)
                .context("parameter without a type")?;
            Constant::from_i64(ty, value)
                .with_context(|| format!("{value} does not fit a parameter of type {ty}"))
        })
        .collect()
}

/// Short label for a fixture's expected outcome.
pub fn expectation_label(expectation: Expectation) -> String {
    match expectation {
        Expectation::Rewritten => "rewritten".to_string(),
        Expectation::Unchanged => "unchanged".to_string(),
        Expectation::Rejected(defect) => format!("rejected ({defect:?})"),
    }
}

/// Render an optional evaluation result.
pub fn value_label(value: Option<Constant>) -> String {
    value.map_or_else(|| "void".to_string(), |c| c.to_string())
}
