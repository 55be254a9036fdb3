//! Methods of the built-in value kinds.
//!
//! Operators arrive here as ordinary method calls (`a + b` is
//! `a.__add__(b)`), so every kind lists its operators next to its container
//! operations. `__eq__`, `__ne__` and `toString` work on every value.

use std::cell::RefCell;

use glint_common::{
    Arguments, HashKey, RuntimeError, ScriptMap, ScriptSet, Value,
};

/// Methods every value answers, including host objects and instances.
pub(crate) fn is_universal(name: &str) -> bool {
    matches!(name, "__eq__" | "__ne__" | "toString")
}

/// Call `name` on a built-in value.
pub(crate) fn call_method(
    receiver: &Value,
    name: &str,
    args: Arguments,
) -> Result<Value, RuntimeError> {
    match name {
        "__eq__" => return Ok(Value::Bool(receiver.equals(one(name, &args)?))),
        "__ne__" => return Ok(Value::Bool(!receiver.equals(one(name, &args)?))),
        "toString" => {
            args.expect_len(name, 0)?;
            return Ok(Value::str(&receiver.to_string()));
        }
        _ => {}
    }
    match receiver {
        Value::Number(n) => number(*n, name, &args),
        Value::Str(s) => string(s, name, &args),
        Value::Bool(b) => match name {
            "__not__" => {
                args.expect_len(name, 0)?;
                Ok(Value::Bool(!b))
            }
            _ => Err(RuntimeError::unknown_member("bool", name)),
        },
        Value::List(items) => list(items, name, &args),
        Value::Map(map) => map_method(map, name, &args),
        Value::Set(set) => set_method(set, name, &args),
        Value::Pair(pair) => match name {
            "first" => {
                args.expect_len(name, 0)?;
                Ok(pair.0.clone())
            }
            "second" => {
                args.expect_len(name, 0)?;
                Ok(pair.1.clone())
            }
            "size" => {
                args.expect_len(name, 0)?;
                Ok(Value::Number(2.0))
            }
            "__getitem__" | "__index__" | "get" => match one(name, &args)?.as_index(2)? {
                0 => Ok(pair.0.clone()),
                _ => Ok(pair.1.clone()),
            },
            _ => Err(RuntimeError::unknown_member("pair", name)),
        },
        other => Err(RuntimeError::unknown_member(other.type_name(), name)),
    }
}

/// The single argument of a one-argument method.
fn one<'a>(name: &str, args: &'a Arguments) -> Result<&'a Value, RuntimeError> {
    args.expect_len(name, 1)?;
    args.expect(name, 0)
}

fn two<'a>(name: &str, args: &'a Arguments) -> Result<(&'a Value, &'a Value), RuntimeError> {
    args.expect_len(name, 2)?;
    Ok((args.expect(name, 0)?, args.expect(name, 1)?))
}

fn none(name: &str, args: &Arguments) -> Result<(), RuntimeError> {
    args.expect_len(name, 0)
}

fn operand(name: &str, args: &Arguments) -> Result<f64, RuntimeError> {
    args.expect_len(name, 1)?;
    args.number(name, 0)
}

// ---- Numbers ----

fn number(n: f64, name: &str, args: &Arguments) -> Result<Value, RuntimeError> {
    let value = match name {
        "__add__" => Value::Number(n + operand(name, args)?),
        "__sub__" => Value::Number(n - operand(name, args)?),
        "__mul__" => Value::Number(n * operand(name, args)?),
        "__div__" => {
            let d = operand(name, args)?;
            if d == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Value::Number(n / d)
        }
        "__mod__" => {
            let d = operand(name, args)?;
            if d == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Value::Number(n % d)
        }
        "__lt__" => Value::Bool(n < operand(name, args)?),
        "__le__" => Value::Bool(n <= operand(name, args)?),
        "__gt__" => Value::Bool(n > operand(name, args)?),
        "__ge__" => Value::Bool(n >= operand(name, args)?),
        "__neg__" => {
            none(name, args)?;
            Value::Number(-n)
        }
        "abs" | "floor" | "ceil" | "round" | "sqrt" | "isInteger" => {
            none(name, args)?;
            match name {
                "abs" => Value::Number(n.abs()),
                "floor" => Value::Number(n.floor()),
                "ceil" => Value::Number(n.ceil()),
                "round" => Value::Number(n.round()),
                "sqrt" => Value::Number(n.sqrt()),
                _ => Value::Bool(n.fract() == 0.0),
            }
        }
        _ => return Err(RuntimeError::unknown_member("number", name)),
    };
    Ok(value)
}

// ---- Strings ----

fn string(s: &str, name: &str, args: &Arguments) -> Result<Value, RuntimeError> {
    let length = s.chars().count();
    let value = match name {
        "__add__" => Value::str(&format!("{s}{}", one(name, args)?)),
        "__lt__" | "__le__" | "__gt__" | "__ge__" => {
            let other = one(name, args)?;
            let Some(other) = other.as_str() else {
                return Err(RuntimeError::type_mismatch(name, "string", other.type_name()));
            };
            Value::Bool(match name {
                "__lt__" => s < other,
                "__le__" => s <= other,
                "__gt__" => s > other,
                _ => s >= other,
            })
        }
        "size" | "length" => {
            none(name, args)?;
            Value::Number(length as f64)
        }
        "get" | "__getitem__" | "__index__" => {
            let index = one(name, args)?.as_index(length)?;
            let c = s.chars().nth(index).unwrap_or_default();
            Value::str(c.encode_utf8(&mut [0; 4]))
        }
        "contains" => Value::Bool(s.contains(text_arg(name, args)?)),
        "indexOf" => {
            let needle = text_arg(name, args)?;
            match s.find(needle) {
                Some(byte) => Value::Number(s[..byte].chars().count() as f64),
                None => Value::Number(-1.0),
            }
        }
        "substring" => {
            let start = args.expect(name, 0)?.as_index(length + 1)?;
            let end = match args.get(1) {
                Some(end) => end.as_index(length + 1)?,
                None => length,
            };
            if args.len() > 2 {
                args.expect_len(name, 2)?;
            }
            if end < start {
                return Err(RuntimeError::InvalidArgument {
                    function: name.to_string(),
                    message: format!("end {end} is before start {start}"),
                });
            }
            Value::str(&s.chars().skip(start).take(end - start).collect::<String>())
        }
        "upper" => {
            none(name, args)?;
            Value::str(&s.to_uppercase())
        }
        "lower" => {
            none(name, args)?;
            Value::str(&s.to_lowercase())
        }
        "split" => {
            let separator = text_arg(name, args)?;
            if separator.is_empty() {
                return Err(RuntimeError::InvalidArgument {
                    function: name.to_string(),
                    message: "empty separator".to_string(),
                });
            }
            Value::list(s.split(separator).map(Value::str).collect())
        }
        "toNumber" => {
            none(name, args)?;
            let n = s.trim().parse::<f64>().map_err(|_| RuntimeError::InvalidArgument {
                function: name.to_string(),
                message: format!("'{s}' is not a number"),
            })?;
            Value::Number(n)
        }
        _ => return Err(RuntimeError::unknown_member("string", name)),
    };
    Ok(value)
}

fn text_arg<'a>(name: &str, args: &'a Arguments) -> Result<&'a str, RuntimeError> {
    let value = one(name, args)?;
    value
        .as_str()
        .ok_or_else(|| RuntimeError::type_mismatch(name, "string", value.type_name()))
}

// ---- Lists ----

fn list(items: &RefCell<Vec<Value>>, name: &str, args: &Arguments) -> Result<Value, RuntimeError> {
    let length = items.borrow().len();
    let value = match name {
        "size" => {
            none(name, args)?;
            Value::Number(length as f64)
        }
        "get" | "__getitem__" | "__index__" => {
            let index = one(name, args)?.as_index(length)?;
            items.borrow()[index].clone()
        }
        "set" | "__setitem__" => {
            let (index, value) = two(name, args)?;
            let index = index.as_index(length)?;
            items.borrow_mut()[index] = value.clone();
            value.clone()
        }
        "insert" => {
            let (index, value) = two(name, args)?;
            let index = index.as_index(length + 1)?;
            items.borrow_mut().insert(index, value.clone());
            Value::None
        }
        "append" => {
            let value = one(name, args)?.clone();
            items.borrow_mut().push(value);
            Value::None
        }
        "remove" => {
            let index = one(name, args)?.as_index(length)?;
            items.borrow_mut().remove(index)
        }
        "pop" => {
            none(name, args)?;
            items
                .borrow_mut()
                .pop()
                .ok_or_else(|| RuntimeError::InvalidArgument {
                    function: name.to_string(),
                    message: "list is empty".to_string(),
                })?
        }
        "contains" => {
            let needle = one(name, args)?;
            Value::Bool(items.borrow().iter().any(|item| item.equals(needle)))
        }
        "indexOf" => {
            let needle = one(name, args)?;
            let found = items.borrow().iter().position(|item| item.equals(needle));
            Value::Number(found.map_or(-1.0, |i| i as f64))
        }
        "clear" => {
            none(name, args)?;
            items.borrow_mut().clear();
            Value::None
        }
        "__add__" => {
            let other = one(name, args)?;
            let Value::List(other) = other else {
                return Err(RuntimeError::type_mismatch(name, "list", other.type_name()));
            };
            let mut joined = items.borrow().clone();
            joined.extend(other.borrow().iter().cloned());
            Value::list(joined)
        }
        _ => return Err(RuntimeError::unknown_member("list", name)),
    };
    Ok(value)
}

// ---- Maps and sets ----

fn map_method(map: &RefCell<ScriptMap>, name: &str, args: &Arguments) -> Result<Value, RuntimeError> {
    let value = match name {
        "size" => {
            none(name, args)?;
            Value::Number(map.borrow().len() as f64)
        }
        "get" => {
            let key = HashKey::new(one(name, args)?.clone())?;
            map.borrow().get(&key).cloned().unwrap_or(Value::None)
        }
        "__getitem__" => {
            let key = HashKey::new(one(name, args)?.clone())?;
            map.borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| RuntimeError::KeyNotFound(key.value().to_string()))?
        }
        "set" | "insert" | "__setitem__" => {
            let (key, value) = two(name, args)?;
            map.borrow_mut()
                .insert(HashKey::new(key.clone())?, value.clone());
            value.clone()
        }
        "remove" => {
            let key = HashKey::new(one(name, args)?.clone())?;
            map.borrow_mut().remove(&key).unwrap_or(Value::None)
        }
        "contains" => {
            let key = HashKey::new(one(name, args)?.clone())?;
            Value::Bool(map.borrow().contains_key(&key))
        }
        "keys" => {
            none(name, args)?;
            Value::list(map.borrow().keys().map(|k| k.value().clone()).collect())
        }
        "values" => {
            none(name, args)?;
            Value::list(map.borrow().values().cloned().collect())
        }
        "__index__" => {
            let index = one(name, args)?.as_index(map.borrow().len())?;
            let map = map.borrow();
            let (key, value) = map
                .iter()
                .nth(index)
                .ok_or(RuntimeError::IndexOutOfBounds {
                    index: index as i64,
                    length: map.len(),
                })?;
            Value::pair(key.value().clone(), value.clone())
        }
        _ => return Err(RuntimeError::unknown_member("map", name)),
    };
    Ok(value)
}

fn set_method(set: &RefCell<ScriptSet>, name: &str, args: &Arguments) -> Result<Value, RuntimeError> {
    let value = match name {
        "size" => {
            none(name, args)?;
            Value::Number(set.borrow().len() as f64)
        }
        "insert" => {
            let key = HashKey::new(one(name, args)?.clone())?;
            Value::Bool(set.borrow_mut().insert(key))
        }
        "remove" => {
            let key = HashKey::new(one(name, args)?.clone())?;
            Value::Bool(set.borrow_mut().remove(&key))
        }
        "contains" => {
            let key = HashKey::new(one(name, args)?.clone())?;
            Value::Bool(set.borrow().contains(&key))
        }
        "toList" => {
            none(name, args)?;
            Value::list(set.borrow().iter().map(|k| k.value().clone()).collect())
        }
        "__index__" => {
            let index = one(name, args)?.as_index(set.borrow().len())?;
            let set = set.borrow();
            set.iter()
                .nth(index)
                .map(|k| k.value().clone())
                .ok_or(RuntimeError::IndexOutOfBounds {
                    index: index as i64,
                    length: set.len(),
                })?
        }
        _ => return Err(RuntimeError::unknown_member("set", name)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(receiver: &Value, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        call_method(receiver, name, Arguments::positional(args))
    }

    #[test]
    fn number_operators() {
        let seven = Value::Number(7.0);
        assert_eq!(call(&seven, "__add__", vec![2.into()]).unwrap(), Value::Number(9.0));
        assert_eq!(call(&seven, "__mod__", vec![4.into()]).unwrap(), Value::Number(3.0));
        assert_eq!(call(&seven, "__lt__", vec![8.into()]).unwrap(), Value::Bool(true));
        assert_eq!(call(&seven, "__neg__", vec![]).unwrap(), Value::Number(-7.0));
        assert_eq!(call(&Value::Number(2.5), "floor", vec![]).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let one = Value::Number(1.0);
        assert_eq!(
            call(&one, "__div__", vec![0.into()]),
            Err(RuntimeError::DivisionByZero)
        );
        assert_eq!(
            call(&one, "__mod__", vec![0.into()]),
            Err(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn number_plus_string_is_a_type_error() {
        let e = call(&Value::Number(1.0), "__add__", vec!["a".into()]).unwrap_err();
        assert_eq!(e.to_string(), "__add__ expects number, found string");
    }

    #[test]
    fn string_concatenates_any_value() {
        let s = Value::str("n=");
        assert_eq!(call(&s, "__add__", vec![3.into()]).unwrap(), Value::str("n=3"));
        assert_eq!(
            call(&s, "__add__", vec![Value::None]).unwrap(),
            Value::str("n=null")
        );
    }

    #[test]
    fn string_methods() {
        let s = Value::str("héllo world");
        assert_eq!(call(&s, "size", vec![]).unwrap(), Value::Number(11.0));
        assert_eq!(call(&s, "get", vec![1.into()]).unwrap(), Value::str("é"));
        assert_eq!(call(&s, "indexOf", vec!["world".into()]).unwrap(), Value::Number(6.0));
        assert_eq!(
            call(&s, "substring", vec![0.into(), 5.into()]).unwrap(),
            Value::str("héllo")
        );
        assert_eq!(call(&s, "upper", vec![]).unwrap(), Value::str("HÉLLO WORLD"));
        let parts = call(&s, "split", vec![" ".into()]).unwrap();
        assert_eq!(parts.to_string(), "[héllo, world]");
        assert_eq!(
            call(&Value::str(" 2.5 "), "toNumber", vec![]).unwrap(),
            Value::Number(2.5)
        );
        assert!(call(&Value::str("x"), "toNumber", vec![]).is_err());
    }

    #[test]
    fn list_mutation_is_shared() {
        let list = Value::list(vec![1.into(), 2.into()]);
        let alias = list.clone();
        call(&list, "append", vec![3.into()]).unwrap();
        call(&list, "insert", vec![0.into(), 0.into()]).unwrap();
        assert_eq!(alias.to_string(), "[0, 1, 2, 3]");
        assert_eq!(call(&list, "remove", vec![1.into()]).unwrap(), Value::Number(1.0));
        assert_eq!(call(&list, "pop", vec![]).unwrap(), Value::Number(3.0));
        assert_eq!(call(&list, "indexOf", vec![2.into()]).unwrap(), Value::Number(1.0));
        assert_eq!(
            call(&list, "get", vec![5.into()]),
            Err(RuntimeError::IndexOutOfBounds {
                index: 5,
                length: 2
            })
        );
    }

    #[test]
    fn map_keys_use_protocol_equality() {
        let map = Value::map(vec![]).unwrap();
        call(&map, "set", vec![3.into(), "a".into()]).unwrap();
        call(&map, "set", vec![Value::Number(3.0), "b".into()]).unwrap();
        assert_eq!(call(&map, "size", vec![]).unwrap(), Value::Number(1.0));
        assert_eq!(call(&map, "get", vec![3.into()]).unwrap(), Value::str("b"));
        assert_eq!(call(&map, "get", vec![4.into()]).unwrap(), Value::None);
        assert_eq!(
            call(&map, "__getitem__", vec![4.into()]),
            Err(RuntimeError::KeyNotFound("4".to_string()))
        );
        let entry = call(&map, "__index__", vec![0.into()]).unwrap();
        assert_eq!(entry.to_string(), "(3, b)");
    }

    #[test]
    fn lists_are_not_hashable_by_content() {
        let set = Value::set(vec![]).unwrap();
        let a = Value::list(vec![]);
        let b = Value::list(vec![]);
        call(&set, "insert", vec![a.clone()]).unwrap();
        assert_eq!(call(&set, "contains", vec![a]).unwrap(), Value::Bool(true));
        assert_eq!(call(&set, "contains", vec![b]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn universal_methods() {
        let pair = Value::pair(1.into(), "x".into());
        let same = Value::pair(1.into(), "x".into());
        assert_eq!(call(&pair, "__eq__", vec![same]).unwrap(), Value::Bool(true));
        assert_eq!(call(&pair, "toString", vec![]).unwrap(), Value::str("(1, x)"));
        assert_eq!(
            call(&Value::None, "size", vec![]).unwrap_err().to_string(),
            "none has no member 'size'"
        );
    }
}
