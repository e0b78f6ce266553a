use std::{
    cell::RefCell,
    io::{self, Write},
    rc::Rc,
};

use crate::{
    diagnostics::{Diagnostic, EaselError, Result},
    number::Num,
    package::Package,
    value::{ObjectValue, Value, ValueKind},
};

pub type Output = Rc<RefCell<dyn Write>>;

pub fn stdout_output() -> Output {
    Rc::new(RefCell::new(io::stdout()))
}

/// Internal sentinel raised by exhausted iterators and absorbed by the
/// iterator combinators.
const STOP_ITERATION: &str = "StopIteration";

fn stop_iteration() -> EaselError {
    Diagnostic::runtime(STOP_ITERATION).into()
}

fn is_stop_iteration(err: &EaselError) -> bool {
    matches!(err, EaselError::Diagnostic(diag) if diag.message == STOP_ITERATION)
}

fn native(
    params: Option<&[&str]>,
    callback: impl Fn(&[Value]) -> Result<Value> + 'static,
) -> Value {
    let params = params.map(|names| names.iter().map(|s| s.to_string()).collect());
    Value::func(params, Rc::new(callback))
}

fn runtime(message: impl Into<String>) -> EaselError {
    Diagnostic::runtime(message).into()
}

fn expect_num<'a>(value: &'a Value, what: &str) -> Result<&'a Num> {
    value
        .as_num()
        .ok_or_else(|| runtime(format!("{what} must be number")))
}

/// The reserved `builtin` package, preloaded into every global scope.
/// `print`/`println` write through the given output handle.
pub fn builtin_package(out: Output) -> Package {
    let println_out = Rc::clone(&out);
    Package::builder("builtin")
        .value(
            "print",
            native(None, move |args| {
                let mut out = out.borrow_mut();
                for arg in args {
                    write!(out, "{arg}").map_err(EaselError::from)?;
                }
                Ok(Value::none())
            }),
        )
        .value(
            "println",
            native(None, move |args| {
                let mut out = println_out.borrow_mut();
                for arg in args {
                    write!(out, "{arg}").map_err(EaselError::from)?;
                }
                writeln!(out).map_err(EaselError::from)?;
                Ok(Value::none())
            }),
        )
        .value(
            "all",
            native(None, |args| {
                Ok(Value::bool(args.iter().all(truthy)))
            }),
        )
        .value(
            "any",
            native(None, |args| {
                Ok(Value::bool(args.iter().any(truthy)))
            }),
        )
        .value(
            "sum",
            native(None, |args| {
                let mut total = Num::zero();
                for arg in args {
                    let num = expect_num(arg, "sum() arguments")?;
                    total = total.checked_add(num).map_err(runtime)?;
                }
                Ok(Value::num(total))
            }),
        )
        .value(
            "len",
            native(Some(&["v"]), |args| {
                ensure_exact(args, 1, "len")?;
                let len = match &*args[0].0 {
                    ValueKind::Str(s) => s.len(),
                    ValueKind::Array(arr) => arr.len(),
                    ValueKind::Object(obj) => obj.len(),
                    _ => {
                        return Err(runtime("len() argument must be string, array, or object"));
                    }
                };
                Ok(Value::num(Num::from_usize(len)))
            }),
        )
        .value("min", native(None, |args| pick(args, "min", false)))
        .value("max", native(None, |args| pick(args, "max", true)))
        .value(
            "abs",
            native(Some(&["v"]), |args| {
                ensure_exact(args, 1, "abs")?;
                let num = expect_num(&args[0], "abs() argument")?;
                Ok(Value::num(num.abs()))
            }),
        )
        .value(
            "pow",
            native(Some(&["base", "exp"]), |args| {
                ensure_exact(args, 2, "pow")?;
                let base = expect_num(&args[0], "pow() first argument")?;
                let exp = expect_num(&args[1], "pow() second argument")?;
                if base.sign() < 0 {
                    return Err(runtime("pow() first argument must be positive"));
                }
                Ok(Value::num(base.checked_pow(exp).map_err(runtime)?))
            }),
        )
        .value(
            "iterable",
            native(Some(&["v"]), |args| {
                ensure_exact(args, 1, "iterable")?;
                Ok(Value::bool(matches!(
                    &*args[0].0,
                    ValueKind::Array(_) | ValueKind::Object(_)
                )))
            }),
        )
        .value(
            "bool",
            native(Some(&["v"]), |args| {
                ensure_exact(args, 1, "bool")?;
                Ok(Value::bool(truthy(&args[0])))
            }),
        )
        .value("is_none", type_predicate("is_none", |v| {
            matches!(&*v.0, ValueKind::None)
        }))
        .value("is_bool", type_predicate("is_bool", |v| {
            matches!(&*v.0, ValueKind::Bool(_))
        }))
        .value("is_number", type_predicate("is_number", |v| {
            matches!(&*v.0, ValueKind::Num(_))
        }))
        .value("is_string", type_predicate("is_string", |v| {
            matches!(&*v.0, ValueKind::Str(_))
        }))
        .value("is_array", type_predicate("is_array", |v| {
            matches!(&*v.0, ValueKind::Array(_))
        }))
        .value("is_object", type_predicate("is_object", |v| {
            matches!(&*v.0, ValueKind::Object(_))
        }))
        .value("is_func", type_predicate("is_func", |v| {
            matches!(&*v.0, ValueKind::Func(_))
        }))
        .value(
            "str",
            native(Some(&["v"]), |args| {
                ensure_exact(args, 1, "str")?;
                Ok(Value::string(args[0].to_string()))
            }),
        )
        .value(
            "str_bytes",
            native(Some(&["v"]), |args| {
                ensure_exact(args, 1, "str_bytes")?;
                let text = args[0]
                    .as_str()
                    .ok_or_else(|| runtime("str_bytes() takes string as argument"))?;
                Ok(Value::bytes(text.as_bytes().to_vec()))
            }),
        )
        .build()
}

/// The `iter` package: lazy sequences over closure state.
pub fn iter_package() -> Package {
    Package::builder("iter")
        .value(
            "range",
            native(None, |args| {
                let (start, stop, step) = match args {
                    [stop] => (Num::zero(), range_arg(stop, "first")?, Num::from_i64(1)),
                    [start, stop] => (
                        range_arg(start, "first")?,
                        range_arg(stop, "second")?,
                        Num::from_i64(1),
                    ),
                    [start, stop, step] => (
                        range_arg(start, "first")?,
                        range_arg(stop, "second")?,
                        range_arg(step, "third")?,
                    ),
                    _ => {
                        return Err(runtime(
                            "expected range(stop), range(start, stop) or range(start, stop, step)",
                        ));
                    }
                };
                Ok(iterator_object(range_next(start, stop, step)?))
            }),
        )
        .value(
            "from",
            native(Some(&["iterable"]), |args| {
                ensure_exact(args, 1, "from")?;
                Ok(iterator_object(collection_next(&args[0])?))
            }),
        )
        .build()
}

fn range_arg(value: &Value, position: &str) -> Result<Num> {
    value
        .as_num()
        .cloned()
        .ok_or_else(|| runtime(format!("range() {position} argument must be number")))
}

fn truthy(value: &Value) -> bool {
    match &*value.0 {
        ValueKind::None => false,
        ValueKind::Bool(b) => *b,
        ValueKind::Num(num) => !num.is_zero(),
        ValueKind::Str(s) => !s.is_empty(),
        ValueKind::Array(arr) => !arr.is_empty(),
        ValueKind::Object(obj) => !obj.is_empty(),
        ValueKind::Func(_) => true,
    }
}

fn ensure_exact(args: &[Value], expected: usize, name: &str) -> Result<()> {
    if args.len() != expected {
        let plural = if expected == 1 { "argument" } else { "arguments" };
        return Err(runtime(format!(
            "{name}() takes exactly {expected} {plural}, got {}",
            args.len()
        )));
    }
    Ok(())
}

fn type_predicate(name: &'static str, check: impl Fn(&Value) -> bool + 'static) -> Value {
    native(Some(&["v"]), move |args| {
        ensure_exact(args, 1, name)?;
        Ok(Value::bool(check(&args[0])))
    })
}

/// Variadic min/max over numbers or strings; an empty argument list yields
/// none.
fn pick(args: &[Value], name: &str, want_greater: bool) -> Result<Value> {
    let Some(first) = args.first() else {
        return Ok(Value::none());
    };
    match &*first.0 {
        ValueKind::Num(_) | ValueKind::Str(_) => {}
        _ => {
            return Err(runtime(format!("{name}() arguments must be number or string")));
        }
    }

    let mut best = first.clone();
    for arg in &args[1..] {
        let replace = match (&*best.0, &*arg.0) {
            (ValueKind::Num(a), ValueKind::Num(b)) => (b > a) == want_greater && b != a,
            (ValueKind::Str(a), ValueKind::Str(b)) => (b > a) == want_greater && b != a,
            _ => {
                return Err(runtime(format!(
                    "types mismatch: {} != {}",
                    best.type_name(),
                    arg.type_name()
                )));
            }
        };
        if replace {
            best = arg.clone();
        }
    }
    Ok(best)
}

/// Wraps a `next()` closure into the iterator object exposing the
/// combinators. Every combinator shares the captured closure, so pulling
/// from one advances them all.
fn iterator_object(next: Value) -> Value {
    let mut object = ObjectValue::new();
    let entries = [
        ("list", iter_list(next.clone())),
        ("count", iter_count(next.clone())),
        ("max", iter_max(next.clone())),
        ("where", iter_where(next.clone())),
        ("select", iter_select(next)),
    ];
    for (name, value) in entries {
        object
            .insert(Value::string(name), value)
            .unwrap_or_else(|_| unreachable!("string keys always encode"));
    }
    Value::object(object)
}

fn call_next(next: &Value) -> Result<Value> {
    match next.as_func() {
        Some(func) => func.call(&[]),
        None => Err(runtime("iterator state must be callable")),
    }
}

fn iter_list(next: Value) -> Value {
    native(None, move |args| {
        ensure_exact(args, 0, "list")?;
        let mut elems = Vec::new();
        loop {
            match call_next(&next) {
                Ok(elem) => elems.push(elem),
                Err(err) if is_stop_iteration(&err) => break,
                Err(err) => return Err(err),
            }
        }
        Ok(Value::array(elems))
    })
}

fn iter_count(next: Value) -> Value {
    native(None, move |args| {
        ensure_exact(args, 0, "count")?;
        let mut count = 0usize;
        loop {
            match call_next(&next) {
                Ok(_) => count += 1,
                Err(err) if is_stop_iteration(&err) => break,
                Err(err) => return Err(err),
            }
        }
        Ok(Value::num(Num::from_usize(count)))
    })
}

fn iter_max(next: Value) -> Value {
    native(Some(&["max"]), move |args| {
        ensure_exact(args, 1, "max")?;
        let limit = expect_num(&args[0], "max() argument")?
            .as_i64()
            .map_err(runtime)?;
        let next = next.clone();
        let taken = Rc::new(RefCell::new(0i64));
        Ok(iterator_object(native(None, move |_| {
            if *taken.borrow() >= limit {
                return Err(stop_iteration());
            }
            let elem = call_next(&next)?;
            *taken.borrow_mut() += 1;
            Ok(elem)
        })))
    })
}

fn iter_where(next: Value) -> Value {
    native(Some(&["predicate"]), move |args| {
        ensure_exact(args, 1, "where")?;
        let predicate = unary_callback(&args[0], "predicate")?;
        let next = next.clone();
        Ok(iterator_object(native(None, move |_| loop {
            let elem = call_next(&next)?;
            let verdict = predicate.call(&[elem.clone()])?;
            match verdict.as_bool() {
                Some(true) => return Ok(elem),
                Some(false) => continue,
                None => return Err(runtime("predicate must return a bool")),
            }
        })))
    })
}

fn iter_select(next: Value) -> Value {
    native(Some(&["selector"]), move |args| {
        ensure_exact(args, 1, "select")?;
        let selector = unary_callback(&args[0], "selector")?;
        let next = next.clone();
        Ok(iterator_object(native(None, move |_| {
            let elem = call_next(&next)?;
            selector.call(&[elem])
        })))
    })
}

fn unary_callback(value: &Value, what: &str) -> Result<crate::value::FuncValue> {
    let func = value
        .as_func()
        .ok_or_else(|| runtime(format!("{what} must be a function")))?;
    if func.params.as_ref().map(|p| p.len()) != Some(1) {
        return Err(runtime(format!("{what} must take exactly one argument")));
    }
    Ok(func.clone())
}

fn range_next(start: Num, stop: Num, step: Num) -> Result<Value> {
    if step.is_zero() {
        return Err(runtime("step cannot be zero"));
    }

    let descending = step.sign() < 0;
    // A start already past the stop in the step direction is empty.
    let exhausted = if descending { start < stop } else { start > stop };
    if exhausted {
        return Ok(native(None, |_| Err(stop_iteration())));
    }

    let cursor = Rc::new(RefCell::new(start));
    Ok(native(None, move |_| {
        let current = cursor.borrow().clone();
        let done = if descending {
            current <= stop
        } else {
            current >= stop
        };
        if done {
            return Err(stop_iteration());
        }
        let advanced = current.checked_add(&step).map_err(runtime)?;
        *cursor.borrow_mut() = advanced;
        Ok(Value::num(current))
    }))
}

/// A `next()` closure over an array's elements or an object's
/// `{"key", "value"}` pairs.
fn collection_next(value: &Value) -> Result<Value> {
    match &*value.0 {
        ValueKind::Array(_) => {
            let source = value.clone();
            let cursor = Rc::new(RefCell::new(0usize));
            Ok(native(None, move |_| {
                let Some(arr) = source.as_array() else {
                    return Err(runtime("iterator source must be an array"));
                };
                let idx = *cursor.borrow();
                if idx >= arr.len() {
                    return Err(stop_iteration());
                }
                *cursor.borrow_mut() += 1;
                Ok(arr.at(idx))
            }))
        }
        ValueKind::Object(obj) => {
            let pairs: Vec<(Value, Value)> = obj
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            let cursor = Rc::new(RefCell::new(0usize));
            Ok(native(None, move |_| {
                let idx = *cursor.borrow();
                let Some((key, value)) = pairs.get(idx) else {
                    return Err(stop_iteration());
                };
                *cursor.borrow_mut() += 1;
                let mut pair = ObjectValue::new();
                pair.insert(Value::string("key"), key.clone())
                    .map_err(runtime)?;
                pair.insert(Value::string("value"), value.clone())
                    .map_err(runtime)?;
                Ok(Value::object(pair))
            }))
        }
        _ => Err(runtime("argument must be an array or object")),
    }
}
