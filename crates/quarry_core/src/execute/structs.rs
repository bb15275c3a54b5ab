//! Execution rules for struct field access.

use quarry_error::{EngineError, Result};

use crate::arrays::compute::unary_elementwise;
use crate::arrays::scalar::ScalarValue;
use crate::dispatch::{Pattern, TypeClass};
use crate::execute::generic::{expect_group_by, regroup};
use crate::execute::{EvalCtx, Registry};
use crate::expr::{ExprRef, OpKind};
use crate::value::Value;

pub fn register(registry: &mut Registry) {
    use Pattern::{Exact, OneOf};

    registry.register(
        &[OpKind::StructField],
        &[
            OneOf(&[TypeClass::Struct, TypeClass::Null, TypeClass::Series]),
            Exact(TypeClass::Str),
        ],
        struct_field,
    );
    registry.register(
        &[OpKind::StructField],
        &[Exact(TypeClass::SeriesGroupBy), Exact(TypeClass::Str)],
        struct_field_group_by,
    );
}

fn field_of(value: &ScalarValue, field: &str) -> Result<ScalarValue> {
    if value.is_null() {
        return Ok(ScalarValue::Null);
    }
    match value {
        ScalarValue::Struct(fields) => fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| {
                EngineError::unsupported_type(format!("struct has no field '{field}'"))
            }),
        other => Err(EngineError::unsupported_type(format!(
            "expected a struct value, got {}",
            other.datatype()
        ))),
    }
}

fn struct_field(_ctx: &EvalCtx<'_>, _node: &ExprRef, operands: Vec<Value>) -> Result<Value> {
    let operand = operands[0].to_computed("struct field")?;
    let field = operands[1]
        .expect_scalar("struct field")?
        .as_str()
        .ok_or_else(|| EngineError::internal("struct field expects a name"))?
        .to_string();
    Ok(unary_elementwise(&operand, move |v| field_of(v, &field))?.into())
}

fn struct_field_group_by(
    ctx: &EvalCtx<'_>,
    node: &ExprRef,
    operands: Vec<Value>,
) -> Result<Value> {
    let grouped = expect_group_by(&operands[0])?;
    let result = struct_field(
        ctx,
        node,
        vec![
            Value::Series(std::sync::Arc::clone(&grouped.column)),
            operands[1].clone(),
        ],
    )?;
    regroup(grouped, result.to_computed("struct field")?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::expr::build;
    use crate::source::MemorySource;

    #[test]
    fn field_from_struct_literal() {
        let engine = Engine::new(Box::new(MemorySource::new()));
        let person = build::lit(ScalarValue::Struct(vec![
            ("name".to_string(), ScalarValue::from("ada")),
            ("age".to_string(), ScalarValue::Int64(36)),
        ]));

        match engine.execute(&build::struct_field(&person, "age")).unwrap() {
            Value::Scalar(v) => assert_eq!(v, ScalarValue::Int64(36)),
            other => panic!("unexpected: {other:?}"),
        }

        let missing = build::struct_field(&person, "height");
        assert!(engine.execute(&missing).is_err());
    }
}
