//! Schema-driven translator from JSON AST nodes to the typed [`super`] model
//! (§4.2). Pure: the only side effect is reporting `import`/`import from`
//! statements to a pluggable [`ImportObserver`], which the embedder can use
//! to prefetch or validate module names ahead of execution.

use serde_json::Value as Json;

use super::*;
use crate::exception::{ExcType, RunError, RunResult};
use crate::intern::Interns;

/// Observes `import`/`import from` statements as they are loaded. Purely an
/// observation hook; the loader never resolves or executes modules itself.
pub trait ImportObserver {
    fn on_import(&mut self, dotted_name: &str, alias: Option<&str>) {
        let _ = (dotted_name, alias);
    }
    fn on_import_from(&mut self, module: &str, names: &[(String, Option<String>)], is_star: bool) {
        let _ = (module, names, is_star);
    }
}

/// An observer that does nothing; the default when the embedder doesn't care.
pub struct NoopObserver;
impl ImportObserver for NoopObserver {}

pub struct Loader<'a> {
    interns: &'a mut Interns,
    filename: &'a str,
    observer: &'a mut dyn ImportObserver,
}

fn err(filename: &str, line: u32, msg: impl Into<String>) -> RunError {
    RunError::simple(ExcType::ParseError, format!("{filename}:{line}: {}", msg.into()))
}

fn node_type(node: &Json) -> &str {
    node.get("type").and_then(Json::as_str).unwrap_or("")
}

fn node_line(node: &Json) -> u32 {
    node.get("lineno").and_then(Json::as_u64).unwrap_or(0) as u32
}

impl<'a> Loader<'a> {
    pub fn new(interns: &'a mut Interns, filename: &'a str, observer: &'a mut dyn ImportObserver) -> Self {
        Self { interns, filename, observer }
    }

    fn bug(&self, line: u32, msg: impl Into<String>) -> RunError {
        err(self.filename, line, msg)
    }

    fn req<'j>(&self, node: &'j Json, field: &str, line: u32) -> RunResult<&'j Json> {
        node.get(field).filter(|v| !v.is_null()).ok_or_else(|| self.bug(line, format!("missing required field '{field}'")))
    }

    pub fn load_module(&mut self, root: &Json) -> RunResult<Module> {
        if node_type(root) != "Module" {
            return Err(self.bug(node_line(root), "expected a Module node at the top level"));
        }
        let body = root.get("body").and_then(Json::as_array).cloned().unwrap_or_default();
        let mut statements = Vec::with_capacity(body.len());
        for stmt in &body {
            statements.push(self.load_statement(stmt)?);
        }
        Ok(Module { body: statements })
    }

    fn load_block(&mut self, node: &Json, field: &str) -> RunResult<Vec<Statement>> {
        let arr = node.get(field).and_then(Json::as_array).cloned().unwrap_or_default();
        arr.iter().map(|s| self.load_statement(s)).collect()
    }

    fn load_statement(&mut self, node: &Json) -> RunResult<Statement> {
        let line = node_line(node);
        let kind = match node_type(node) {
            "Expr" => StatementKind::Expr(self.load_expr(self.req(node, "value", line)?)?),
            "Assign" => {
                let targets = node
                    .get("targets")
                    .and_then(Json::as_array)
                    .ok_or_else(|| self.bug(line, "Assign missing targets"))?
                    .iter()
                    .map(|t| self.load_target(t))
                    .collect::<RunResult<Vec<_>>>()?;
                let value = self.load_expr(self.req(node, "value", line)?)?;
                StatementKind::Assign { targets, value }
            }
            "AnnAssign" => {
                let target = self.load_target(self.req(node, "target", line)?)?;
                let value = node.get("value").filter(|v| !v.is_null()).map(|v| self.load_expr(v)).transpose()?;
                StatementKind::AnnAssign { target, value }
            }
            "AugAssign" => {
                let target = self.load_target(self.req(node, "target", line)?)?;
                let op = self.load_binop(self.req(node, "op", line)?, line)?;
                let value = self.load_expr(self.req(node, "value", line)?)?;
                StatementKind::AugAssign { target, op, value }
            }
            "Delete" => {
                let targets = node
                    .get("targets")
                    .and_then(Json::as_array)
                    .ok_or_else(|| self.bug(line, "Delete missing targets"))?
                    .iter()
                    .map(|t| self.load_target(t))
                    .collect::<RunResult<Vec<_>>>()?;
                StatementKind::Delete(targets)
            }
            "Global" => StatementKind::Global(self.load_name_list(node, "names", line)?),
            "Nonlocal" => StatementKind::Nonlocal(self.load_name_list(node, "names", line)?),
            "If" => {
                let test = self.load_expr(self.req(node, "test", line)?)?;
                let body = self.load_block(node, "body")?;
                let orelse = self.load_block(node, "orelse")?;
                StatementKind::If { test, body, orelse }
            }
            "While" => {
                let test = self.load_expr(self.req(node, "test", line)?)?;
                let body = self.load_block(node, "body")?;
                StatementKind::While { test, body }
            }
            "For" => {
                let target = self.load_target(self.req(node, "target", line)?)?;
                let iter = self.load_expr(self.req(node, "iter", line)?)?;
                let body = self.load_block(node, "body")?;
                StatementKind::For { target, iter, body }
            }
            "Pass" => StatementKind::Pass,
            "Break" => StatementKind::Break,
            "Continue" => StatementKind::Continue,
            "Return" => {
                let value = node.get("value").filter(|v| !v.is_null()).map(|v| self.load_expr(v)).transpose()?;
                StatementKind::Return(value)
            }
            "Raise" => {
                let exc = node.get("exc").filter(|v| !v.is_null()).map(|v| self.load_expr(v)).transpose()?;
                let cause = node.get("cause").filter(|v| !v.is_null()).map(|v| self.load_expr(v)).transpose()?;
                StatementKind::Raise { exc, cause }
            }
            "Try" => self.load_try(node, line)?,
            "FunctionDef" => StatementKind::FunctionDef(self.load_function_def(node, line)?),
            "ClassDef" => StatementKind::ClassDef(self.load_class_def(node, line)?),
            "Import" => self.load_import(node, line)?,
            "ImportFrom" => self.load_import_from(node, line)?,
            other => return Err(self.bug(line, format!("unsupported statement node '{other}'"))),
        };
        Ok(Statement { kind, line })
    }

    fn load_try(&mut self, node: &Json, line: u32) -> RunResult<StatementKind> {
        let body = self.load_block(node, "body")?;
        let orelse = self.load_block(node, "orelse")?;
        let finalbody = self.load_block(node, "finalbody")?;
        let handler_nodes = node.get("handlers").and_then(Json::as_array).cloned().unwrap_or_default();
        let mut handlers = Vec::with_capacity(handler_nodes.len());
        for h in &handler_nodes {
            let hline = node_line(h);
            let types = match h.get("type_") {
                Some(t) if !t.is_null() => Some(self.load_handler_types(t)?),
                _ => None,
            };
            let name = h.get("name").and_then(Json::as_str).map(|s| self.interns.intern(s));
            let hbody = self.load_block(h, "body")?;
            handlers.push(ExceptHandler { types, name, body: hbody, line: hline });
        }
        Ok(StatementKind::Try { body, handlers, orelse, finalbody })
    }

    fn load_handler_types(&mut self, node: &Json) -> RunResult<Vec<Expr>> {
        if node_type(node) == "Tuple" {
            let elems = node.get("elts").and_then(Json::as_array).cloned().unwrap_or_default();
            elems.iter().map(|e| self.load_expr(e)).collect()
        } else {
            Ok(vec![self.load_expr(node)?])
        }
    }

    fn load_function_def(&mut self, node: &Json, line: u32) -> RunResult<FunctionDef> {
        let name = self.interns.intern(node.get("name").and_then(Json::as_str).unwrap_or(""));
        let params = self.load_params(self.req(node, "args", line)?, line)?;
        let body = self.load_block(node, "body")?;
        let decorators = self.load_decorators(node, line)?;
        Ok(FunctionDef { name, params, body, decorators, line })
    }

    fn load_class_def(&mut self, node: &Json, line: u32) -> RunResult<ClassDef> {
        let name = self.interns.intern(node.get("name").and_then(Json::as_str).unwrap_or(""));
        let bases = node
            .get("bases")
            .and_then(Json::as_array)
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|b| self.load_expr(b))
            .collect::<RunResult<Vec<_>>>()?;
        let body = self.load_block(node, "body")?;
        let decorators = self.load_decorators(node, line)?;
        Ok(ClassDef { name, bases, body, decorators, line })
    }

    /// Recognizes `@dataclass(...)`, `@classmethod`, `@staticmethod`
    /// structurally; others are preserved verbatim but ignored (§4.2).
    fn load_decorators(&mut self, node: &Json, line: u32) -> RunResult<Decorators> {
        let mut out = Decorators::default();
        let decos = node.get("decorator_list").and_then(Json::as_array).cloned().unwrap_or_default();
        for d in &decos {
            match node_type(d) {
                "Name" if d.get("id").and_then(Json::as_str) == Some("dataclass") => {
                    out.dataclass = Some(DataclassOptions::default());
                }
                "Name" if d.get("id").and_then(Json::as_str) == Some("classmethod") => out.classmethod = true,
                "Name" if d.get("id").and_then(Json::as_str) == Some("staticmethod") => out.staticmethod = true,
                "Call" if matches!(d.get("func").map(node_type), Some("Name"))
                    && d.get("func").and_then(|f| f.get("id")).and_then(Json::as_str) == Some("dataclass") =>
                {
                    let mut opts = DataclassOptions::default();
                    for kw in d.get("keywords").and_then(Json::as_array).cloned().unwrap_or_default() {
                        if kw.get("arg").and_then(Json::as_str) == Some("frozen") {
                            let v = self.load_expr(self.req(&kw, "value", line)?)?;
                            if let ExprKind::Constant(Constant::Bool(b)) = v.kind {
                                opts.frozen = b;
                            }
                        }
                    }
                    out.dataclass = Some(opts);
                }
                _ => out.other.push(serde_json::to_string(d).unwrap_or_default()),
            }
        }
        Ok(out)
    }

    fn load_import(&mut self, node: &Json, line: u32) -> RunResult<StatementKind> {
        let mut names = Vec::new();
        for n in node.get("names").and_then(Json::as_array).cloned().unwrap_or_default() {
            let dotted = n.get("name").and_then(Json::as_str).unwrap_or("").to_owned();
            let alias_str = n.get("asname").and_then(Json::as_str);
            self.observer.on_import(&dotted, alias_str);
            let alias = alias_str.map(|s| self.interns.intern(s));
            names.push((dotted, alias));
        }
        let _ = line;
        Ok(StatementKind::Import { names })
    }

    fn load_import_from(&mut self, node: &Json, line: u32) -> RunResult<StatementKind> {
        let module = node.get("module").and_then(Json::as_str).unwrap_or("").to_owned();
        let mut names = Vec::new();
        let mut is_star = false;
        let mut observer_names = Vec::new();
        for n in node.get("names").and_then(Json::as_array).cloned().unwrap_or_default() {
            let name = n.get("name").and_then(Json::as_str).unwrap_or("").to_owned();
            if name == "*" {
                is_star = true;
            }
            let alias_str = n.get("asname").and_then(Json::as_str);
            observer_names.push((name.clone(), alias_str.map(str::to_owned)));
            let alias = alias_str.map(|s| self.interns.intern(s));
            names.push((name, alias));
        }
        self.observer.on_import_from(&module, &observer_names, is_star);
        let _ = line;
        Ok(StatementKind::ImportFrom { module, names, is_star })
    }

    fn load_name_list(&mut self, node: &Json, field: &str, line: u32) -> RunResult<Vec<StringId>> {
        let names = node
            .get(field)
            .and_then(Json::as_array)
            .ok_or_else(|| self.bug(line, format!("missing '{field}'")))?;
        Ok(names.iter().filter_map(Json::as_str).map(|s| self.interns.intern(s)).collect())
    }

    fn load_params(&mut self, node: &Json, line: u32) -> RunResult<ParamList> {
        let mut params = ParamList::default();
        for a in node.get("args").and_then(Json::as_array).cloned().unwrap_or_default() {
            params.args.push(self.interns.intern(a.get("arg").and_then(Json::as_str).unwrap_or("")));
        }
        for d in node.get("defaults").and_then(Json::as_array).cloned().unwrap_or_default() {
            params.defaults.push(self.load_expr(&d)?);
        }
        if let Some(va) = node.get("vararg").filter(|v| !v.is_null()) {
            params.vararg = Some(self.interns.intern(va.get("arg").and_then(Json::as_str).unwrap_or("")));
        }
        for a in node.get("kwonlyargs").and_then(Json::as_array).cloned().unwrap_or_default() {
            params.kwonly.push(self.interns.intern(a.get("arg").and_then(Json::as_str).unwrap_or("")));
        }
        for d in node.get("kw_defaults").and_then(Json::as_array).cloned().unwrap_or_default() {
            params.kwonly_defaults.push(if d.is_null() { None } else { Some(self.load_expr(&d)?) });
        }
        if let Some(kw) = node.get("kwarg").filter(|v| !v.is_null()) {
            params.kwarg = Some(self.interns.intern(kw.get("arg").and_then(Json::as_str).unwrap_or("")));
        }
        let _ = line;
        Ok(params)
    }

    fn load_binop(&mut self, node: &Json, line: u32) -> RunResult<BinOp> {
        let name = node.get("op").and_then(Json::as_str).or_else(|| node.as_str()).unwrap_or("");
        Ok(match name {
            "Add" => BinOp::Add,
            "Sub" => BinOp::Sub,
            "Mult" => BinOp::Mul,
            "Div" => BinOp::TrueDiv,
            "FloorDiv" => BinOp::FloorDiv,
            "Mod" => BinOp::Mod,
            "Pow" => BinOp::Pow,
            "LShift" => BinOp::LShift,
            "RShift" => BinOp::RShift,
            "BitOr" => BinOp::BitOr,
            "BitXor" => BinOp::BitXor,
            "BitAnd" => BinOp::BitAnd,
            "MatMult" => BinOp::MatMul,
            other => return Err(self.bug(line, format!("unsupported binary operator '{other}'"))),
        })
    }

    fn load_cmpop(&mut self, name: &str, line: u32) -> RunResult<CmpOp> {
        Ok(match name {
            "Eq" => CmpOp::Eq,
            "NotEq" => CmpOp::NotEq,
            "Lt" => CmpOp::Lt,
            "LtE" => CmpOp::LtE,
            "Gt" => CmpOp::Gt,
            "GtE" => CmpOp::GtE,
            "Is" => CmpOp::Is,
            "IsNot" => CmpOp::IsNot,
            "In" => CmpOp::In,
            "NotIn" => CmpOp::NotIn,
            other => return Err(self.bug(line, format!("unsupported comparison operator '{other}'"))),
        })
    }

    fn load_target(&mut self, node: &Json) -> RunResult<AssignTarget> {
        let line = node_line(node);
        Ok(match node_type(node) {
            "Name" => AssignTarget::Name(self.interns.intern(node.get("id").and_then(Json::as_str).unwrap_or(""))),
            "Attribute" => {
                let value = self.load_expr(self.req(node, "value", line)?)?;
                let attr = self.interns.intern(node.get("attr").and_then(Json::as_str).unwrap_or(""));
                AssignTarget::Attribute { value, attr }
            }
            "Subscript" => {
                let value = self.load_expr(self.req(node, "value", line)?)?;
                let index = self.load_subscript_index(self.req(node, "slice", line)?)?;
                AssignTarget::Subscript { value, index }
            }
            "Tuple" | "List" => {
                let elts = node.get("elts").and_then(Json::as_array).cloned().unwrap_or_default();
                AssignTarget::Tuple(elts.iter().map(|e| self.load_target(e)).collect::<RunResult<Vec<_>>>()?)
            }
            "Starred" => AssignTarget::Starred(Box::new(self.load_target(self.req(node, "value", line)?)?)),
            other => return Err(self.bug(line, format!("unsupported assignment target '{other}'"))),
        })
    }

    fn load_subscript_index(&mut self, node: &Json) -> RunResult<Expr> {
        self.load_expr(node)
    }

    fn load_expr(&mut self, node: &Json) -> RunResult<Expr> {
        let line = node_line(node);
        let kind = self.load_expr_kind(node, line)?;
        Ok(Expr { kind, line })
    }

    /// Loads `func` of a `Call` in "caller" context: an `Attribute` there
    /// becomes a bound-method-call marker rather than a plain field read (§4.2).
    fn load_callee(&mut self, node: &Json) -> RunResult<Expr> {
        let line = node_line(node);
        if node_type(node) == "Attribute" {
            let value = self.load_expr(self.req(node, "value", line)?)?;
            let attr = self.interns.intern(node.get("attr").and_then(Json::as_str).unwrap_or(""));
            return Ok(Expr { kind: ExprKind::Attribute { value: Box::new(value), attr, is_call: true }, line });
        }
        self.load_expr(node)
    }

    fn load_expr_kind(&mut self, node: &Json, line: u32) -> RunResult<ExprKind> {
        Ok(match node_type(node) {
            "Constant" => ExprKind::Constant(self.load_constant(node, line)?),
            "Name" => {
                let id = node.get("id").and_then(Json::as_str).unwrap_or("");
                if id == "JavaClass" {
                    ExprKind::JavaClassKeyword
                } else {
                    ExprKind::Name(self.interns.intern(id))
                }
            }
            "Starred" => ExprKind::Starred(Box::new(self.load_expr(self.req(node, "value", line)?)?)),
            "Tuple" => ExprKind::Tuple(self.load_expr_list(node, "elts")?),
            "List" => ExprKind::List(self.load_expr_list(node, "elts")?),
            "Set" => ExprKind::Set(self.load_expr_list(node, "elts")?),
            "Dict" => {
                let keys = node.get("keys").and_then(Json::as_array).cloned().unwrap_or_default();
                let values = self.load_expr_list(node, "values")?;
                let keys = keys
                    .iter()
                    .map(|k| if k.is_null() { Ok(None) } else { self.load_expr(k).map(Some) })
                    .collect::<RunResult<Vec<_>>>()?;
                ExprKind::Dict { keys, values }
            }
            "UnaryOp" => {
                let op_name = node.get("op").and_then(Json::as_str).unwrap_or("");
                let op = match op_name {
                    "Not" => UnaryOp::Not,
                    "USub" => UnaryOp::Neg,
                    "UAdd" => UnaryOp::Pos,
                    "Invert" => UnaryOp::Invert,
                    other => return Err(self.bug(line, format!("unsupported unary operator '{other}'"))),
                };
                ExprKind::UnaryOp(op, Box::new(self.load_expr(self.req(node, "operand", line)?)?))
            }
            "BinOp" => {
                let left = self.load_expr(self.req(node, "left", line)?)?;
                let op = self.load_binop(node, line)?;
                let right = self.load_expr(self.req(node, "right", line)?)?;
                ExprKind::BinOp(Box::new(left), op, Box::new(right))
            }
            "BoolOp" => {
                let op_name = node.get("op").and_then(Json::as_str).unwrap_or("");
                let op = match op_name {
                    "And" => BoolOp::And,
                    "Or" => BoolOp::Or,
                    other => return Err(self.bug(line, format!("unsupported bool operator '{other}'"))),
                };
                ExprKind::BoolOp(op, self.load_expr_list(node, "values")?)
            }
            "Compare" => {
                let left = self.load_expr(self.req(node, "left", line)?)?;
                let ops = node.get("ops").and_then(Json::as_array).cloned().unwrap_or_default();
                let comparators = self.load_expr_list(node, "comparators")?;
                let mut rest = Vec::with_capacity(ops.len());
                for (op_node, comparator) in ops.iter().zip(comparators) {
                    let name = op_node.as_str().unwrap_or("");
                    rest.push((self.load_cmpop(name, line)?, comparator));
                }
                ExprKind::Compare(Box::new(left), rest)
            }
            "IfExp" => ExprKind::IfExp {
                test: Box::new(self.load_expr(self.req(node, "test", line)?)?),
                body: Box::new(self.load_expr(self.req(node, "body", line)?)?),
                orelse: Box::new(self.load_expr(self.req(node, "orelse", line)?)?),
            },
            "Call" => {
                let func = self.load_callee(self.req(node, "func", line)?)?;
                let args = self.load_expr_list(node, "args")?;
                let mut keywords = Vec::new();
                for kw in node.get("keywords").and_then(Json::as_array).cloned().unwrap_or_default() {
                    let name = kw.get("arg").and_then(Json::as_str).map(|s| self.interns.intern(s));
                    let value = self.load_expr(self.req(&kw, "value", line)?)?;
                    keywords.push(Keyword { name, value });
                }
                ExprKind::Call { func: Box::new(func), args, keywords }
            }
            "Attribute" => {
                let value = self.load_expr(self.req(node, "value", line)?)?;
                let attr = self.interns.intern(node.get("attr").and_then(Json::as_str).unwrap_or(""));
                ExprKind::Attribute { value: Box::new(value), attr, is_call: false }
            }
            "Subscript" => {
                let value = self.load_expr(self.req(node, "value", line)?)?;
                let index = self.load_subscript_index(self.req(node, "slice", line)?)?;
                ExprKind::Subscript { value: Box::new(value), index: Box::new(index) }
            }
            "Slice" => {
                let lower = node.get("lower").filter(|v| !v.is_null()).map(|v| self.load_expr(v)).transpose()?.map(Box::new);
                let upper = node.get("upper").filter(|v| !v.is_null()).map(|v| self.load_expr(v)).transpose()?.map(Box::new);
                let step = node.get("step").filter(|v| !v.is_null()).map(|v| self.load_expr(v)).transpose()?.map(Box::new);
                ExprKind::Slice { lower, upper, step }
            }
            "Lambda" => {
                let params = self.load_params(self.req(node, "args", line)?, line)?;
                let body = Box::new(self.load_expr(self.req(node, "body", line)?)?);
                ExprKind::Lambda { params, body }
            }
            "ListComp" => {
                let element = Box::new(self.load_expr(self.req(node, "elt", line)?)?);
                let mut generators = Vec::new();
                for g in node.get("generators").and_then(Json::as_array).cloned().unwrap_or_default() {
                    let target = self.load_expr(self.req(&g, "target", line)?)?;
                    let iter = self.load_expr(self.req(&g, "iter", line)?)?;
                    let ifs = g
                        .get("ifs")
                        .and_then(Json::as_array)
                        .cloned()
                        .unwrap_or_default()
                        .iter()
                        .map(|i| self.load_expr(i))
                        .collect::<RunResult<Vec<_>>>()?;
                    generators.push(Comprehension { target, iter, ifs });
                }
                ExprKind::ListComp { element, generators }
            }
            "JoinedStr" => ExprKind::JoinedStr(self.load_joined_str(node, line)?),
            "NamedExpr" => {
                let target_node = self.req(node, "target", line)?;
                let target = self.interns.intern(target_node.get("id").and_then(Json::as_str).unwrap_or(""));
                let value = Box::new(self.load_expr(self.req(node, "value", line)?)?);
                ExprKind::NamedExpr { target, value }
            }
            other => return Err(self.bug(line, format!("unsupported expression node '{other}'"))),
        })
    }

    fn load_joined_str(&mut self, node: &Json, line: u32) -> RunResult<FStringTemplate> {
        let mut parts = Vec::new();
        for v in node.get("values").and_then(Json::as_array).cloned().unwrap_or_default() {
            match node_type(&v) {
                "Constant" => {
                    if let Constant::Str(s) = self.load_constant(&v, line)? {
                        parts.push(FStringPart::Literal(s));
                    }
                }
                "FormattedValue" => {
                    let expr = Box::new(self.load_expr(self.req(&v, "value", line)?)?);
                    let conversion = v
                        .get("conversion")
                        .and_then(Json::as_i64)
                        .and_then(|c| char::from_u32(u32::try_from(c).ok()?));
                    let format_spec = match v.get("format_spec") {
                        Some(fs) if !fs.is_null() => match self.load_expr_kind(fs, line)? {
                            ExprKind::JoinedStr(tmpl) => Some(
                                tmpl.parts
                                    .into_iter()
                                    .map(|p| match p {
                                        FStringPart::Literal(s) => s,
                                        FStringPart::Value { .. } => String::new(),
                                    })
                                    .collect::<String>(),
                            ),
                            _ => None,
                        },
                        _ => None,
                    };
                    parts.push(FStringPart::Value { expr, conversion, format_spec });
                }
                other => return Err(self.bug(line, format!("unsupported f-string part '{other}'"))),
            }
        }
        Ok(FStringTemplate { parts })
    }

    fn load_expr_list(&mut self, node: &Json, field: &str) -> RunResult<Vec<Expr>> {
        node.get(field)
            .and_then(Json::as_array)
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|e| self.load_expr(e))
            .collect()
    }

    fn load_constant(&mut self, node: &Json, line: u32) -> RunResult<Constant> {
        let typename = node.get("typename").and_then(Json::as_str).unwrap_or("");
        let value = node.get("value").cloned().unwrap_or(Json::Null);
        Ok(match typename {
            "NoneType" => Constant::None,
            "bool" => Constant::Bool(value.as_bool().unwrap_or(false)),
            "int" => Constant::Int(value.as_i64().ok_or_else(|| self.bug(line, "malformed int constant"))?),
            "float" => Constant::Float(value.as_f64().ok_or_else(|| self.bug(line, "malformed float constant"))?),
            "str" => Constant::Str(value.as_str().unwrap_or("").to_owned()),
            other => return Err(self.bug(line, format!("unsupported constant typename '{other}'"))),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_simple_assignment() {
        let json: Json = serde_json::from_str(
            r#"{"type":"Module","body":[
                {"type":"Assign","lineno":1,"targets":[{"type":"Name","id":"x","lineno":1}],
                 "value":{"type":"Constant","typename":"int","value":1,"lineno":1}}
            ]}"#,
        )
        .unwrap();
        let mut interns = Interns::new();
        let mut observer = NoopObserver;
        let mut loader = Loader::new(&mut interns, "test.py", &mut observer);
        let module = loader.load_module(&json).unwrap();
        assert_eq!(module.body.len(), 1);
        assert!(matches!(module.body[0].kind, StatementKind::Assign { .. }));
    }

    #[test]
    fn attribute_in_caller_position_is_a_bound_call() {
        let json: Json = serde_json::from_str(
            r#"{"type":"Module","body":[
                {"type":"Expr","lineno":1,"value":{"type":"Call","lineno":1,
                    "func":{"type":"Attribute","lineno":1,"attr":"run",
                            "value":{"type":"Name","id":"r","lineno":1}},
                    "args":[], "keywords":[]}}
            ]}"#,
        )
        .unwrap();
        let mut interns = Interns::new();
        let mut observer = NoopObserver;
        let mut loader = Loader::new(&mut interns, "test.py", &mut observer);
        let module = loader.load_module(&json).unwrap();
        let StatementKind::Expr(e) = &module.body[0].kind else { panic!() };
        let ExprKind::Call { func, .. } = &e.kind else { panic!() };
        assert!(matches!(&func.kind, ExprKind::Attribute { is_call: true, .. }));
    }
}
