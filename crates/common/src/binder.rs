//! Parameter binding: positional and keyword arguments against a declared
//! parameter list with optional defaults.

use std::collections::HashMap;

use crate::error::RuntimeError;
use crate::object::Argument;
use crate::procedure::Parameter;
use crate::value::{Name, Value};

/// Bind call arguments to parameter names.
///
/// Rules, applied in order:
/// 1. More arguments than parameters fails.
/// 2. Positional arguments bind in declaration order.
/// 3. After the first keyword argument, a positional one fails.
/// 4. A keyword naming no parameter, or one already bound, fails.
/// 5. Any parameter left unbound takes its default, or fails as missing.
pub fn bind(
    function: &str,
    params: &[Parameter],
    args: Vec<Argument>,
) -> Result<HashMap<Name, Value>, RuntimeError> {
    if args.len() > params.len() {
        return Err(RuntimeError::TooManyArguments {
            function: function.to_string(),
            expected: params.len(),
            found: args.len(),
        });
    }

    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    let mut seen_keyword = false;

    for (position, arg) in args.into_iter().enumerate() {
        match arg.name {
            None => {
                if seen_keyword {
                    return Err(RuntimeError::PositionalAfterKeyword {
                        function: function.to_string(),
                    });
                }
                slots[position] = Some(arg.value);
            }
            Some(name) => {
                seen_keyword = true;
                let index = params
                    .iter()
                    .position(|p| p.name == name)
                    .ok_or_else(|| RuntimeError::UnknownKeyword {
                        function: function.to_string(),
                        name: name.to_string(),
                    })?;
                if slots[index].is_some() {
                    return Err(RuntimeError::DuplicateArgument {
                        function: function.to_string(),
                        name: name.to_string(),
                    });
                }
                slots[index] = Some(arg.value);
            }
        }
    }

    params
        .iter()
        .zip(slots)
        .map(|(param, slot)| {
            let value = slot
                .or_else(|| param.default.clone())
                .ok_or_else(|| RuntimeError::MissingArgument {
                    function: function.to_string(),
                    parameter: param.name.to_string(),
                })?;
            Ok((param.name.clone(), value))
        })
        .collect()
}
