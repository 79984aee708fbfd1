use std::fmt;

use crate::{
    error::{Error, Result},
    ir::{self, IrType},
    parser::ast::{Prototype, TypeName},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Integer,
    Float,
    String,
    Boolean,
    Void,
    Sequence(Box<Type>, usize),
}

impl Type {
    pub fn resolve(name: &TypeName) -> Result<Type> {
        let scalar = match name.name.as_str() {
            "int" => Type::Integer,
            "float" => Type::Float,
            "string" => Type::String,
            "bool" => Type::Boolean,
            "void" => Type::Void,
            _ => {
                return Err(Error::UnsupportedType {
                    name: name.to_string(),
                })
            }
        };

        match name.len {
            None => Ok(scalar),
            Some(_) if scalar == Type::Void => Err(Error::UnsupportedType {
                name: name.to_string(),
            }),
            Some(len) => Ok(Type::Sequence(scalar.into(), len)),
        }
    }

    pub fn to_ir(&self) -> IrType {
        match self {
            Type::Integer => IrType::I64,
            Type::Float => IrType::Double,
            Type::String => IrType::string(),
            Type::Boolean => IrType::I1,
            Type::Void => IrType::Void,
            Type::Sequence(elem, len) => IrType::Ptr(IrType::Array(elem.to_ir().into(), *len).into()),
        }
    }

    pub fn from_ir(ty: &IrType) -> Option<Type> {
        let ty = match ty {
            IrType::I64 => Type::Integer,
            IrType::Double => Type::Float,
            IrType::I1 => Type::Boolean,
            IrType::Void => Type::Void,
            IrType::Ptr(inner) => match inner.as_ref() {
                IrType::I8 => Type::String,
                IrType::Array(elem, len) => match Type::from_ir(elem)? {
                    Type::Void | Type::Sequence(..) => return None,
                    elem => Type::Sequence(elem.into(), *len),
                },
                _ => return None,
            },
            _ => return None,
        };
        Some(ty)
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Type::Void | Type::Sequence(..))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integer => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::String => write!(f, "string"),
            Type::Boolean => write!(f, "bool"),
            Type::Void => write!(f, "void"),
            Type::Sequence(elem, len) => write!(f, "{}[{}]", elem, len),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
}

impl Signature {
    /// Resolves every declared type of a prototype. Parameters may not be
    /// void and results may not be sequences.
    pub fn resolve(proto: &Prototype) -> Result<Signature> {
        let params = proto
            .params
            .iter()
            .map(|param| match Type::resolve(&param._type)? {
                Type::Void => Err(Error::UnsupportedType {
                    name: param._type.to_string(),
                }),
                ty => Ok(ty),
            })
            .collect::<Result<Vec<_>>>()?;

        let ret = match Type::resolve(&proto.return_type)? {
            Type::Sequence(..) => {
                return Err(Error::UnsupportedType {
                    name: proto.return_type.to_string(),
                })
            }
            ty => ty,
        };

        Ok(Signature { params, ret })
    }

    pub fn of(function: &ir::Function) -> Option<Signature> {
        Some(Signature {
            params: function
                .params
                .iter()
                .map(|p| Type::from_ir(&p.ty))
                .collect::<Option<Vec<_>>>()?,
            ret: Type::from_ir(&function.ret)?,
        })
    }

    pub fn declaration(&self, proto: &Prototype) -> ir::Function {
        let params = proto
            .params
            .iter()
            .zip(&self.params)
            .map(|(param, ty)| ir::Param {
                name: param.name.clone(),
                ty: ty.to_ir(),
            })
            .collect();
        ir::Function::declaration(&proto.name, params, self.ret.to_ir())
    }
}
