//! Small numeric plugin set shared by unit tests.
//!
//! Types: `IntType` (i64), `FloatType` (f64), `StrNumType` (decimal string
//! wrapper), `HexNumType` (hex string wrapper), all under `Number`.
//! Translators: str->int, int->float, str->hex, hex->str.
//! `arith.cube` is implemented through a nested `arith.power` call.

use crate::algorithm::{AbstractAlgorithm, ConcreteAlgorithm, Param};
use crate::error::{KernelError, MetagraphError, WrapperError};
use crate::plugin::Plugin;
use crate::resolver::Resolver;
use crate::translator::Translator;
use crate::types::{AbstractType, ConcreteType};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrNum(String);

impl StrNum {
    pub fn new(text: &str) -> Result<Self, WrapperError> {
        if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
            return Err(WrapperError::new(format!("'{}' is not a decimal number", text)));
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexNum(String);

impl HexNum {
    pub fn new(text: &str) -> Result<Self, WrapperError> {
        if text.is_empty() || !text.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(WrapperError::new(format!("'{}' is not a hex number", text)));
        }
        Ok(Self(text.to_lowercase()))
    }
}

fn parse_failure(err: std::num::ParseIntError) -> KernelError {
    KernelError::failed(err.to_string())
}

fn example_plugin() -> Plugin {
    Plugin::new("example_plugin")
        .with_abstract_type(AbstractType::new("Number").with_properties(["is_even"]))
        .with_concrete_type(
            ConcreteType::new::<i64>("IntType", "Number")
                .with_native_eq::<i64>()
                .with_property("is_even", |v| {
                    Ok(serde_json::Value::Bool(v.cast::<i64>()? % 2 == 0))
                }),
        )
        .with_concrete_type(
            ConcreteType::new::<f64>("FloatType", "Number").with_native_eq::<f64>(),
        )
        .with_wrapper(
            ConcreteType::wrapper::<StrNum>("StrNumType", "Number")
                .with_native_eq::<StrNum>()
                .with_constructor(|args| {
                    let text = args
                        .first()
                        .ok_or(KernelError::MissingArgument(0))?
                        .cast::<String>()?;
                    Ok(Value::new(StrNum::new(text)?))
                }),
        )
        .with_wrapper(ConcreteType::wrapper::<HexNum>("HexNumType", "Number"))
        .with_translator(Translator::new("strnum_to_int", "StrNumType", "IntType", |v| {
            let parsed: i64 = v.cast::<StrNum>()?.0.parse().map_err(parse_failure)?;
            Ok(Value::new(parsed))
        }))
        .with_translator(Translator::new("int_to_float", "IntType", "FloatType", |v| {
            Ok(Value::new(*v.cast::<i64>()? as f64))
        }))
        .with_translator(Translator::new("strnum_to_hex", "StrNumType", "HexNumType", |v| {
            let parsed: u64 = v.cast::<StrNum>()?.0.parse().map_err(parse_failure)?;
            Ok(Value::new(HexNum::new(&format!("{:x}", parsed))?))
        }))
        .with_translator(Translator::new("hex_to_strnum", "HexNumType", "StrNumType", |v| {
            let parsed = u64::from_str_radix(&v.cast::<HexNum>()?.0, 16).map_err(parse_failure)?;
            Ok(Value::new(StrNum::new(&parsed.to_string())?))
        }))
        .with_abstract_algorithm(
            AbstractAlgorithm::new("ln")
                .with_param(Param::typed("x", "Number"))
                .returning("Number"),
        )
        .with_abstract_algorithm(
            AbstractAlgorithm::new("arith.power")
                .with_param(Param::typed("x", "Number"))
                .with_param(Param::typed("p", "Number"))
                .returning("Number"),
        )
        .with_abstract_algorithm(
            AbstractAlgorithm::new("arith.negate")
                .with_param(Param::typed("x", "Number"))
                .returning("Number"),
        )
        .with_abstract_algorithm(
            AbstractAlgorithm::new("arith.scale")
                .with_param(Param::typed("x", "Number"))
                .with_param(Param::value_of::<i64>("factor").with_default(Value::new(2i64)))
                .returning("Number"),
        )
        .with_concrete_algorithm(
            ConcreteAlgorithm::new("hex_ln", "ln", |args| {
                let n = u64::from_str_radix(&args[0].cast::<HexNum>()?.0, 16)
                    .map_err(parse_failure)?;
                Ok(Value::new((n as f64).ln()))
            })
            .accepting("HexNumType")
            .returning("FloatType"),
        )
        .with_concrete_algorithm(
            ConcreteAlgorithm::new("int_power", "arith.power", |args| {
                let base = *args[0].cast::<i64>()?;
                let exp = u32::try_from(*args[1].cast::<i64>()?)
                    .map_err(|err| KernelError::failed(err.to_string()))?;
                base.checked_pow(exp)
                    .map(Value::new)
                    .ok_or_else(|| KernelError::failed("integer overflow"))
            })
            .accepting("IntType")
            .accepting("IntType")
            .returning("IntType"),
        )
        .with_abstract_algorithm(
            AbstractAlgorithm::new("arith.cube")
                .with_param(Param::typed("x", "Number"))
                .returning("Number"),
        )
        .with_concrete_algorithm(float_negate())
        .with_concrete_algorithm(int_cube())
        .with_concrete_algorithm(
            ConcreteAlgorithm::new("int_scale", "arith.scale", |args| {
                Ok(Value::new(args[0].cast::<i64>()? * args[1].cast::<i64>()?))
            })
            .accepting("IntType")
            .accepting_value()
            .returning("IntType"),
        )
}

fn int_cube() -> ConcreteAlgorithm {
    ConcreteAlgorithm::with_resolver("int_cube", "arith.cube", |scope, args| {
        let x = args
            .into_iter()
            .next()
            .ok_or_else(|| MetagraphError::invalid_argument("arith.cube", "missing 'x'"))?;
        scope.call("arith.power", vec![x, Value::new(3i64).into()])
    })
    .accepting("IntType")
    .returning("IntType")
}

fn float_negate() -> ConcreteAlgorithm {
    ConcreteAlgorithm::new("float_negate", "arith.negate", |args| {
        Ok(Value::new(-*args[0].cast::<f64>()?))
    })
    .accepting("FloatType")
    .returning("FloatType")
}

fn example2_plugin() -> Plugin {
    Plugin::new("example2_plugin")
        .with_concrete_algorithm(
            ConcreteAlgorithm::new("float_power", "arith.power", |args| {
                Ok(Value::new(args[0].cast::<f64>()?.powf(*args[1].cast::<f64>()?)))
            })
            .accepting("FloatType")
            .accepting("FloatType")
            .returning("FloatType"),
        )
        .with_concrete_algorithm(float_negate())
}

/// Resolver with both example plugins registered.
pub fn numeric_resolver() -> Resolver {
    let mut resolver = Resolver::new();
    resolver
        .register_all([example_plugin(), example2_plugin()])
        .expect("register example plugins");
    resolver
}
