//! Typed model argument declarations.
//!
//! A model does not get inspected at runtime. Instead the caller declares its
//! argument list up front: an ordered [`Signature`] for named-argument models,
//! or a [`VectorSignature`] for models whose first argument is the parameter
//! vector. Argument values travel to the model in an [`Arguments`] list.

use crate::error::{FitError, Result};

/// A value bound to a model argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Scalar(f64),
    Bool(bool),
    Vector(Vec<f64>),
    Text(String),
    /// Declared without a value. Must be set before the model is evaluated.
    Null,
}

impl ArgValue {
    /// Coerce to a real number, if the value has a numeric reading.
    ///
    /// Booleans map to 0/1 and text is parsed; vectors and `Null` never coerce.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Scalar(v) => Some(*v),
            ArgValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            ArgValue::Text(s) => s.trim().parse::<f64>().ok(),
            ArgValue::Vector(_) | ArgValue::Null => None,
        }
    }

    pub fn as_slice(&self) -> Option<&[f64]> {
        match self {
            ArgValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }

    fn kind(&self) -> &'static str {
        match self {
            ArgValue::Scalar(_) => "scalar",
            ArgValue::Bool(_) => "bool",
            ArgValue::Vector(_) => "vector",
            ArgValue::Text(_) => "text",
            ArgValue::Null => "null",
        }
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Scalar(v)
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<Vec<f64>> for ArgValue {
    fn from(v: Vec<f64>) -> Self {
        ArgValue::Vector(v)
    }
}

impl From<&[f64]> for ArgValue {
    fn from(v: &[f64]) -> Self {
        ArgValue::Vector(v.to_vec())
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Text(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Text(v)
    }
}

/// One declared model argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    pub name: String,
    pub default: Option<ArgValue>,
}

impl ArgSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, default: impl Into<ArgValue>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
        }
    }

    /// No default, or a default with a numeric reading.
    pub fn is_fittable_candidate(&self) -> bool {
        match &self.default {
            None => true,
            Some(v) => v.as_f64().is_some(),
        }
    }
}

/// Ordered argument list of a named-argument model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    args: Vec<ArgSpec>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an argument without a default.
    pub fn arg(mut self, name: impl Into<String>) -> Self {
        self.args.push(ArgSpec::required(name));
        self
    }

    /// Declare an argument with a default value.
    pub fn arg_default(mut self, name: impl Into<String>, default: impl Into<ArgValue>) -> Self {
        self.args.push(ArgSpec::with_default(name, default));
        self
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    pub fn contains(&self, name: &str) -> bool {
        self.args.iter().any(|a| a.name == name)
    }

    pub(crate) fn check_unique(&self) -> Result<()> {
        check_unique_names(self.args.iter().map(|a| a.name.as_str()))
    }
}

/// Declaration of a model taking the parameter vector as its first argument.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSignature {
    pub vector_arg: String,
    pub kwargs: Vec<ArgSpec>,
    /// The model accepts keyword arguments beyond the declared ones.
    pub accepts_var_kwargs: bool,
}

impl VectorSignature {
    pub fn new(vector_arg: impl Into<String>) -> Self {
        Self {
            vector_arg: vector_arg.into(),
            kwargs: Vec::new(),
            accepts_var_kwargs: false,
        }
    }

    pub fn kwarg(mut self, name: impl Into<String>) -> Self {
        self.kwargs.push(ArgSpec::required(name));
        self
    }

    pub fn kwarg_default(mut self, name: impl Into<String>, default: impl Into<ArgValue>) -> Self {
        self.kwargs.push(ArgSpec::with_default(name, default));
        self
    }

    pub fn var_kwargs(mut self) -> Self {
        self.accepts_var_kwargs = true;
        self
    }

    pub fn declares(&self, name: &str) -> bool {
        self.kwargs.iter().any(|a| a.name == name)
    }

    pub(crate) fn check_unique(&self) -> Result<()> {
        check_unique_names(
            std::iter::once(self.vector_arg.as_str()).chain(self.kwargs.iter().map(|a| a.name.as_str())),
        )
    }
}

/// Ordered name → value list handed to a model callable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    entries: Vec<(String, ArgValue)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a value, keeping first-insertion order.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ArgValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut ArgValue> {
        self.entries.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read a numeric argument. Intended for use inside model callables.
    pub fn scalar(&self, name: &str) -> Result<f64> {
        let value = self.require(name)?;
        value.as_f64().ok_or_else(|| FitError::InvalidValue {
            name: name.to_string(),
            reason: format!("expected a number, found {}", value.kind()),
        })
    }

    /// Read a vector argument. Intended for use inside model callables.
    pub fn vector(&self, name: &str) -> Result<&[f64]> {
        let value = self.require(name)?;
        value.as_slice().ok_or_else(|| FitError::InvalidValue {
            name: name.to_string(),
            reason: format!("expected a vector, found {}", value.kind()),
        })
    }

    fn require(&self, name: &str) -> Result<&ArgValue> {
        match self.get(name) {
            Some(ArgValue::Null) | None => Err(FitError::MissingValue {
                name: name.to_string(),
            }),
            Some(v) => Ok(v),
        }
    }

    /// First argument whose value is still `Null`.
    pub(crate) fn first_null(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| v.is_null())
            .map(|(n, _)| n.as_str())
    }
}

fn check_unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen: Vec<&str> = Vec::new();
    for name in names {
        if seen.contains(&name) {
            return Err(FitError::DuplicateName {
                name: name.to_string(),
            });
        }
        seen.push(name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_follows_numeric_reading() {
        assert_eq!(ArgValue::Scalar(2.5).as_f64(), Some(2.5));
        assert_eq!(ArgValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(ArgValue::from(" 3 ").as_f64(), Some(3.0));
        assert_eq!(ArgValue::from("linear").as_f64(), None);
        assert_eq!(ArgValue::from(vec![1.0]).as_f64(), None);
        assert_eq!(ArgValue::Null.as_f64(), None);
    }

    #[test]
    fn candidate_classification() {
        assert!(ArgSpec::required("m").is_fittable_candidate());
        assert!(ArgSpec::with_default("b", 1.0).is_fittable_candidate());
        assert!(!ArgSpec::with_default("x", vec![0.0, 1.0]).is_fittable_candidate());
        assert!(!ArgSpec::with_default("mode", "fast").is_fittable_candidate());
    }

    #[test]
    fn arguments_keep_insertion_order_on_replace() {
        let mut args = Arguments::new().with("a", 1.0).with("b", 2.0);
        args.insert("a", 5.0);
        let names: Vec<&str> = args.names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(args.scalar("a").unwrap(), 5.0);
    }

    #[test]
    fn typed_reads_name_the_argument() {
        let args = Arguments::new().with("x", vec![1.0, 2.0]).with("k", ArgValue::Null);
        assert_eq!(args.vector("x").unwrap(), &[1.0, 2.0]);
        let err = args.scalar("x").unwrap_err();
        assert!(err.to_string().contains("'x'"));
        assert!(matches!(args.scalar("k"), Err(FitError::MissingValue { .. })));
        assert!(matches!(args.vector("nope"), Err(FitError::MissingValue { .. })));
    }

    #[test]
    fn duplicate_declarations_rejected() {
        let sig = Signature::new().arg("a").arg("a");
        assert!(matches!(sig.check_unique(), Err(FitError::DuplicateName { .. })));

        let sig = VectorSignature::new("theta").kwarg("theta");
        assert!(sig.check_unique().is_err());
    }
}
