//! Built-in functions, found after locals, program members and host modules.
//!
//! `__list__`, `__map__` and `__pair__` back the `[..]`, `{..}` and `a : b`
//! literals; the rest are ordinary functions scripts may call or load as
//! values.

use glint_common::{Arguments, ExecutionState, RuntimeError, Value};

use crate::methods;

/// A built-in function.
pub type Builtin = fn(&mut ExecutionState, Arguments) -> Result<Value, RuntimeError>;

/// The built-in called `name`, if there is one.
pub fn lookup(name: &str) -> Option<Builtin> {
    let builtin: Builtin = match name {
        "print" => print,
        "str" => string,
        "len" => len,
        "range" => range,
        "List" | "__list__" => list,
        "Map" | "__map__" => map,
        "Set" => set,
        "Pair" | "__pair__" => pair,
        "typeOf" => type_of,
        "raise" => raise,
        "min" => min,
        "max" => max,
        _ => return None,
    };
    Some(builtin)
}

/// The method a forwarding built-in sends to its single argument. Calls by
/// name to these go through the same dispatch as `receiver.method()`, so
/// instances and host objects can answer them.
pub(crate) fn forwarded(name: &str) -> Option<&'static str> {
    match name {
        "len" => Some("size"),
        _ => None,
    }
}

/// The receiver of a forwarding built-in.
pub(crate) fn forward_receiver(function: &str, args: Arguments) -> Result<Value, RuntimeError> {
    single(function, args)
}

/// Argument values of a built-in, which takes no keyword arguments.
fn positional(function: &str, args: Arguments) -> Result<Vec<Value>, RuntimeError> {
    args.into_vec()
        .into_iter()
        .map(|arg| match arg.name {
            Some(name) => Err(RuntimeError::UnknownKeyword {
                function: function.to_string(),
                name: name.to_string(),
            }),
            None => Ok(arg.value),
        })
        .collect()
}

fn single(function: &str, args: Arguments) -> Result<Value, RuntimeError> {
    args.expect_len(function, 1)?;
    let mut values = positional(function, args)?;
    Ok(values.remove(0))
}

fn print(state: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
    let line: Vec<String> = positional("print", args)?
        .iter()
        .map(Value::to_string)
        .collect();
    state.print(&line.join(" "))?;
    Ok(Value::None)
}

fn string(_: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
    let value = single("str", args)?;
    Ok(Value::str(&value.to_string()))
}

/// `len` loaded as a value; calls by name are forwarded to `size` instead.
fn len(state: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
    match single("len", args)? {
        Value::Object(object) => object.call_method(state, "size", Arguments::default()),
        value => methods::call_method(&value, "size", Arguments::default()),
    }
}

/// `range(end)`, `range(start, end)` or `range(start, end, step)`.
fn range(state: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
    let bounds = positional("range", args.clone())?;
    let (start, end, step) = match bounds.len() {
        1 => (0.0, args.number("range", 0)?, 1.0),
        2 => (args.number("range", 0)?, args.number("range", 1)?, 1.0),
        3 => (
            args.number("range", 0)?,
            args.number("range", 1)?,
            args.number("range", 2)?,
        ),
        0 => {
            return Err(RuntimeError::MissingArgument {
                function: "range".to_string(),
                parameter: "end".to_string(),
            })
        }
        found => {
            return Err(RuntimeError::TooManyArguments {
                function: "range".to_string(),
                expected: 3,
                found,
            })
        }
    };
    if step == 0.0 {
        return Err(RuntimeError::InvalidArgument {
            function: "range".to_string(),
            message: "step must not be zero".to_string(),
        });
    }
    let span = ((end - start) / step).ceil();
    let length = if span > 0.0 { span } else { 0.0 };
    let limit = state.limits.max_range_length;
    if !length.is_finite() || length > limit as f64 {
        return Err(RuntimeError::RangeTooLong { length, limit });
    }
    let items = (0..length as usize)
        .map(|i| Value::Number(start + step * i as f64))
        .collect();
    Ok(Value::list(items))
}

fn list(_: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
    Ok(Value::list(positional("List", args)?))
}

/// A map from `key : value` pairs.
fn map(_: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
    let entries = positional("Map", args)?
        .into_iter()
        .map(|entry| match entry {
            Value::Pair(pair) => Ok((pair.0.clone(), pair.1.clone())),
            other => Err(RuntimeError::type_mismatch("Map", "pair", other.type_name())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Value::map(entries)
}

fn set(_: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
    Value::set(positional("Set", args)?)
}

fn pair(_: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
    args.expect_len("Pair", 2)?;
    let mut values = positional("Pair", args)?.into_iter();
    let first = values.next().unwrap_or(Value::None);
    let second = values.next().unwrap_or(Value::None);
    Ok(Value::pair(first, second))
}

fn type_of(_: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
    let value = single("typeOf", args)?;
    Ok(Value::str(value.type_name()))
}

/// Raise a script error carrying the argument's string form.
fn raise(_: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
    let value = single("raise", args)?;
    Err(RuntimeError::Raised(value.to_string()))
}

fn min(_: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
    extreme("min", args, f64::min)
}

fn max(_: &mut ExecutionState, args: Arguments) -> Result<Value, RuntimeError> {
    extreme("max", args, f64::max)
}

fn extreme(function: &str, args: Arguments, pick: fn(f64, f64) -> f64) -> Result<Value, RuntimeError> {
    let first = args.number(function, 0)?;
    let mut best = first;
    for index in 1..args.len() {
        best = pick(best, args.number(function, index)?);
    }
    positional(function, args)?;
    Ok(Value::Number(best))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut state = ExecutionState::new().with_output(std::io::sink());
        lookup(name).unwrap()(&mut state, Arguments::positional(args))
    }

    #[test]
    fn range_forms() {
        assert_eq!(call("range", vec![3.into()]).unwrap().to_string(), "[0, 1, 2]");
        assert_eq!(
            call("range", vec![2.into(), 5.into()]).unwrap().to_string(),
            "[2, 3, 4]"
        );
        assert_eq!(
            call("range", vec![5.into(), 0.into(), (-2).into()])
                .unwrap()
                .to_string(),
            "[5, 3, 1]"
        );
        assert!(call("range", vec![0.into(), 5.into(), 0.into()]).is_err());
    }

    #[test]
    fn range_length_is_limited() {
        let mut state = ExecutionState::new().with_limits(glint_common::Limits {
            max_range_length: 4,
            ..Default::default()
        });
        let range = lookup("range").unwrap();
        let four = range(&mut state, Arguments::positional(vec![4.into()])).unwrap();
        assert_eq!(four.to_string(), "[0, 1, 2, 3]");
        assert_eq!(
            range(&mut state, Arguments::positional(vec![5.into()])),
            Err(RuntimeError::RangeTooLong {
                length: 5.0,
                limit: 4
            })
        );
        assert!(matches!(
            call("range", vec![Value::Number(f64::INFINITY)]),
            Err(RuntimeError::RangeTooLong { .. })
        ));
        assert_eq!(call("range", vec![(-3).into()]).unwrap().to_string(), "[]");
    }

    #[test]
    fn literal_constructors() {
        let pair = call("__pair__", vec![1.into(), "a".into()]).unwrap();
        let map = call("__map__", vec![pair.clone()]).unwrap();
        assert_eq!(map.to_string(), "{1: a}");
        assert_eq!(
            call("__map__", vec![1.into()]).unwrap_err().to_string(),
            "Map expects pair, found number"
        );
        let set = call("Set", vec![3.into(), Value::Number(3.0)]).unwrap();
        assert_eq!(len_of(set), 1.0);
    }

    fn len_of(value: Value) -> f64 {
        call("len", vec![value]).unwrap().as_number().unwrap()
    }

    #[test]
    fn len_uses_size() {
        assert_eq!(len_of(Value::str("abc")), 3.0);
        assert_eq!(len_of(Value::list(vec![Value::None])), 1.0);
        assert!(call("len", vec![5.into()]).is_err());
    }

    #[test]
    fn min_max_and_type_of() {
        assert_eq!(
            call("min", vec![3.into(), 1.into(), 2.into()]).unwrap(),
            Value::Number(1.0)
        );
        assert_eq!(call("max", vec![3.into(), 7.into()]).unwrap(), Value::Number(7.0));
        assert_eq!(call("typeOf", vec![Value::None]).unwrap(), Value::str("none"));
    }

    #[test]
    fn raise_carries_message() {
        assert_eq!(
            call("raise", vec!["boom".into()]),
            Err(RuntimeError::Raised("boom".to_string()))
        );
    }

    #[test]
    fn keywords_are_rejected() {
        let mut state = ExecutionState::new();
        let args = Arguments::new(vec![glint_common::Argument::keyword("x", 1.into())]);
        let e = lookup("str").unwrap()(&mut state, args).unwrap_err();
        assert!(matches!(e, RuntimeError::UnknownKeyword { .. }));
    }
}
