use crate::{
    codegen::Codegen,
    config::Config,
    error::Result,
    ir::Module,
    lexer::Lexer,
    parser::{ast::Item, Parser},
};

fn parser(source: &str, config: &Config) -> Parser {
    Parser::new(Lexer::new(source).strict(config.strict))
}

/// Compiles a whole source text into a verified module.
///
/// The source is parsed twice. The first pass registers every prototype
/// and extern so bodies may call functions defined further down; the
/// second lowers bodies and top-level statements in source order.
pub fn compile(source: &str, module_name: &str, config: &Config) -> Result<Module> {
    let mut codegen = Codegen::new(module_name, *config);

    let mut declarations = parser(source, config);
    while let Some(item) = declarations.next_item()? {
        match item {
            Item::Function(function) => codegen.declare(&function.proto)?,
            Item::Extern(proto) => codegen.declare(&proto)?,
            Item::Statement(_) => {}
        }
    }

    let mut bodies = parser(source, config);
    while let Some(item) = bodies.next_item()? {
        match item {
            Item::Function(function) => codegen.define(&function)?,
            Item::Extern(proto) => codegen.declare(&proto)?,
            Item::Statement(stmt) => codegen.lower_toplevel(&stmt)?,
        }
    }

    codegen.finish()
}
