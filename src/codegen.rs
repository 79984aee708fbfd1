pub mod control;
pub mod expr;
pub mod scope;
pub mod types;

use crate::{
    config::Config,
    error::{Error, Result},
    ir::{builder::Builder, verify, Function, Module, Runtime, Value},
    optimizer::{Optimize, STANDARD_PIPELINE},
    parser::ast::{Block, Expression, FunctionDeclaration, Prototype, Statement},
};

use self::{
    scope::{Scope, TypedValue},
    types::{Signature, Type},
};

pub const TOPLEVEL: &str = "__toplevel";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continues,
    Terminated,
}

/// Lowers declarations and statements into a [`Module`]. Owns everything a
/// single compilation needs: the module, the builder of the function in
/// progress and its name bindings.
pub struct Codegen {
    module: Module,
    config: Config,
    builder: Option<Builder>,
    scope: Scope,
    return_type: Type,
    toplevel: Option<Builder>,
}

impl Codegen {
    pub fn new(module_name: &str, config: Config) -> Codegen {
        Codegen {
            module: Module::new(module_name),
            config,
            builder: None,
            scope: Scope::new(),
            return_type: Type::Void,
            toplevel: None,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    fn builder(&mut self) -> &mut Builder {
        self.builder
            .as_mut()
            .expect("statements are only lowered inside a function")
    }

    /// Registers a prototype. A repeated declaration with the same signature
    /// is reused, a conflicting one is a redefinition. Runtime routine names
    /// are implicitly declared and may only be redeclared compatibly.
    pub fn declare(&mut self, proto: &Prototype) -> Result<()> {
        let signature = Signature::resolve(proto)?;
        let declaration = signature.declaration(proto);

        if let Some(routine) = Runtime::lookup(&proto.name) {
            if !routine.accepts(&declaration) {
                return Err(Error::Redefinition {
                    name: routine.name().to_owned(),
                });
            }
        }

        match self.module.get_function(&proto.name) {
            Some(existing) if existing.same_signature(&declaration) => Ok(()),
            Some(_) => Err(Error::Redefinition {
                name: proto.name.clone(),
            }),
            None => {
                self.module.add_function(declaration);
                Ok(())
            }
        }
    }

    pub fn define(&mut self, function: &FunctionDeclaration) -> Result<()> {
        let proto = &function.proto;
        self.declare(proto)?;

        let Some(declaration) = self.module.get_function(&proto.name) else {
            return Err(Error::undefined(&proto.name));
        };
        if declaration.body.is_some() {
            return Err(Error::Redefinition {
                name: proto.name.clone(),
            });
        }

        let signature = Signature::resolve(proto)?;
        self.builder = Some(Builder::new(declaration));
        self.scope = Scope::new();
        self.return_type = signature.ret.clone();
        for (idx, (param, ty)) in proto.params.iter().zip(signature.params).enumerate() {
            self.scope.bind(
                &param.name,
                TypedValue::new(Value::Param(idx), ty),
            );
        }

        let lowered = self.lower_body(&function.body);
        let builder = self.builder.take();
        lowered?;

        match builder {
            Some(builder) => self.finalize(builder.finish()),
            None => Ok(()),
        }
    }

    fn lower_body(&mut self, body: &Block) -> Result<()> {
        if self.lower_block(body)? == Flow::Continues && self.return_type == Type::Void {
            self.builder().build_ret(None);
        }
        Ok(())
    }

    /// Lowers a statement outside any function into the synthesized
    /// top-level function.
    pub fn lower_toplevel(&mut self, stmt: &Statement) -> Result<()> {
        let builder = match self.toplevel.take() {
            Some(builder) => builder,
            None => {
                let declaration = Function::declaration(TOPLEVEL, vec![], Type::Void.to_ir());
                if self.module.get_function(TOPLEVEL).is_some() {
                    return Err(Error::Redefinition {
                        name: TOPLEVEL.to_owned(),
                    });
                }
                self.module.add_function(declaration.clone());
                Builder::new(&declaration)
            }
        };

        if builder.is_terminated() {
            self.toplevel = Some(builder);
            return Ok(());
        }

        self.builder = Some(builder);
        self.scope = Scope::new();
        self.return_type = Type::Void;

        let lowered = self.lower_statement(stmt);
        self.toplevel = self.builder.take();
        lowered.map(|_| ())
    }

    /// Completes the top-level function and verifies the whole module.
    pub fn finish(mut self) -> Result<Module> {
        if let Some(mut builder) = self.toplevel.take() {
            builder.build_ret(None);
            self.finalize(builder.finish())?;
        }

        self.module.discard_unused();

        verify::verify_module(&self.module).map_err(|(function, e)| Error::Verification {
            function,
            reason: e.to_string(),
        })?;

        Ok(self.module)
    }

    fn finalize(&mut self, mut function: Function) -> Result<()> {
        if let Err(e) = verify::verify_function(&function, &self.module) {
            self.module.remove_function(&function.name);
            return Err(Error::Verification {
                function: function.name,
                reason: e.to_string(),
            });
        }

        if self.config.optimize {
            function.optimize(STANDARD_PIPELINE);
        }

        self.module.define(function);
        Ok(())
    }

    pub(crate) fn lower_block(&mut self, block: &Block) -> Result<Flow> {
        self.scope.push();

        let mut flow = Flow::Continues;
        for stmt in &block.stmts {
            flow = self.lower_statement(stmt)?;
            if flow == Flow::Terminated {
                break;
            }
        }

        self.scope.pop();
        Ok(flow)
    }

    pub(crate) fn lower_statement(&mut self, stmt: &Statement) -> Result<Flow> {
        match stmt {
            Statement::Expression(expr) => {
                self.lower_expression(expr)?;
                Ok(Flow::Continues)
            }
            Statement::Return(value) => self.lower_return(value.as_ref()),
            Statement::If(stmt) => self.lower_if(stmt),
            Statement::Loop(stmt) => self.lower_loop(stmt),
        }
    }

    fn lower_return(&mut self, value: Option<&Expression>) -> Result<Flow> {
        let Some(expr) = value else {
            if self.return_type != Type::Void {
                return Err(Error::type_mismatch(format!(
                    "missing return value in function returning {}",
                    self.return_type
                )));
            }
            self.builder().build_ret(None);
            return Ok(Flow::Terminated);
        };

        let returned = self.lower_expression(expr)?;
        if returned._type != self.return_type {
            return Err(Error::type_mismatch(format!(
                "cannot return {} from function returning {}",
                returned._type, self.return_type
            )));
        }

        let value = match returned._type {
            Type::Void => None,
            _ => Some(returned.value),
        };
        self.builder().build_ret(value);
        Ok(Flow::Terminated)
    }
}
