/// User-declared record types and their instances.
///
/// `obj point { x, y }` registers an ObjType with ordered field names;
/// instances carry the type id plus one value per field. Operator behavior
/// comes from user functions named `<type>_<op>` resolved through the
/// function registry at dispatch time — there is no inheritance.
use crate::core::value::Value;

#[derive(Debug, Clone)]
pub struct ObjType {
    pub id: usize,
    pub name: String,
    pub fields: Vec<String>,
}

impl ObjType {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Name of the user override function for an operator, e.g. point_add.
    /// Binary overrides are called with the owning object first; when the
    /// dispatch had to swap a right-side object into that position, a third
    /// parameter (if declared) carries the sign flag 1, otherwise 0.
    pub fn op_function(&self, op: &str) -> String {
        format!("{}_{}", self.name, op)
    }
}

#[derive(Debug, Clone)]
pub struct Object {
    pub type_id: usize,
    pub fields: Vec<Value>,
}

impl Object {
    /// Fields start at zero like matrix elements.
    pub fn new(type_id: usize, field_count: usize) -> Self {
        Object {
            type_id,
            fields: vec![Value::from_i64(0); field_count],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_lookup() {
        let ty = ObjType {
            id: 0,
            name: "point".into(),
            fields: vec!["x".into(), "y".into()],
        };
        assert_eq!(ty.field_index("y"), Some(1));
        assert_eq!(ty.field_index("z"), None);
        assert_eq!(ty.op_function("add"), "point_add");
        let o = Object::new(0, 2);
        assert_eq!(o.fields[0].as_i64(), Some(0));
    }
}
