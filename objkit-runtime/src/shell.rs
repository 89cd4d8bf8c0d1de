use std::io;
use std::io::{BufRead, Write};
use std::time::Instant;

use anyhow::{bail, Error};

use objkit_core::decl::{
    ClassKind, Code, ComponentDecl, DelegateKind, DelegateName, DelegationDecl, MethodDecl,
    OptionDecl, Protection, VarDecl,
};
use objkit_core::error::Result as ObjResult;
use objkit_core::value::Value;

use objkit_runtime::host::{CallContext, Host};
use objkit_runtime::universe::Universe;

/// A host that prints every body it is asked to run, then succeeds with
/// `nil`. Handy for poking at the runtime from the shell without a real
/// script engine behind it.
pub struct EchoHost;

impl Host for EchoHost {
    fn eval(
        &self,
        _universe: &mut Universe,
        code: &Code,
        ctx: &CallContext,
        args: &[Value],
    ) -> ObjResult<Value> {
        let receiver = ctx
            .object
            .as_ref()
            .map(|object| object.borrow().name.clone())
            .unwrap_or_else(|| "(class)".to_string());
        println!("run {} on {} {{{}}} {:?}", ctx.member, receiver, code.source(), args);
        Ok(Value::Nil)
    }

    fn handle_removed(&self, path: &str) {
        println!("handle removed: {}", path);
    }

    fn handle_renamed(&self, old: &str, new: &str) {
        println!("handle renamed: {} -> {}", old, new);
    }
}

/// Launches an interactive Read-Eval-Print-Loop against the given universe.
pub fn interactive(universe: &mut Universe, verbose: bool) -> Result<(), Error> {
    let stdin = io::stdin();
    let mut stdin = stdin.lock();
    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    let mut counter = 0;
    let mut line = String::new();
    loop {
        write!(&mut stdout, "({}) objkit | ", counter)?;
        stdout.flush()?;
        line.clear();
        stdin.read_line(&mut line)?;
        if line.is_empty() {
            writeln!(&mut stdout, "exit")?;
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" {
            break;
        }

        let words = split_words(line);
        let start = Instant::now();
        match execute(universe, &words) {
            Ok(Some(output)) => writeln!(&mut stdout, "{}", output)?,
            Ok(None) => {}
            Err(err) => writeln!(&mut stdout, "error: {:#}", err)?,
        }
        if verbose {
            writeln!(
                &mut stdout,
                "Command time: {} ms.",
                start.elapsed().as_millis(),
            )?;
        }
        counter += 1;
    }

    Ok(())
}

/// Execute a command script: one command per line, `#` starts a comment.
pub fn script(universe: &mut Universe, source: &str) -> Result<(), Error> {
    for (number, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let words = split_words(line);
        match execute(universe, &words) {
            Ok(Some(output)) => println!("{}", output),
            Ok(None) => {}
            Err(err) => bail!("line {}: {:#}", number + 1, err),
        }
    }
    Ok(())
}

/// Split a command line into words, keeping `{...}` groups (nesting
/// allowed) as single words with the outer braces stripped.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        if ch == '{' {
            chars.next();
            let mut depth = 1;
            let mut word = String::new();
            for ch in chars.by_ref() {
                match ch {
                    '{' => {
                        depth += 1;
                        word.push(ch);
                    }
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                        word.push(ch);
                    }
                    _ => word.push(ch),
                }
            }
            words.push(word);
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            words.push(word);
        }
    }
    words
}

fn parse_value(text: &str) -> Value {
    if let Ok(value) = text.parse::<i64>() {
        return Value::Integer(value);
    }
    if let Ok(value) = text.parse::<f64>() {
        return Value::Double(value);
    }
    match text {
        "nil" => Value::Nil,
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => Value::string(text),
    }
}

fn parse_values(words: &[String]) -> Vec<Value> {
    words.iter().map(|word| parse_value(word)).collect()
}

fn execute(universe: &mut Universe, words: &[String]) -> Result<Option<String>, Error> {
    let (command, rest) = match words.split_first() {
        Some(split) => split,
        None => return Ok(None),
    };
    match command.as_str() {
        "help" => Ok(Some(HELP.trim_end().to_string())),
        "class" => {
            let name = expect(rest, 0, "class NAME [KIND]")?;
            let kind = match rest.get(1).map(String::as_str) {
                None | Some("plain") => ClassKind::Plain,
                Some("value") => ClassKind::ValueType,
                Some("composite") => ClassKind::Composite,
                Some("adapter") => ClassKind::Adapter,
                Some(other) => bail!("unknown class kind: {}", other),
            };
            let class = universe.create_class(name, kind)?;
            let name = class.borrow().name.clone();
            Ok(Some(name))
        }
        "inherit" => {
            let class = universe.find_class(expect(rest, 0, "inherit CLASS BASE")?)?;
            let base = universe.find_class(expect(rest, 1, "inherit CLASS BASE")?)?;
            universe.add_base(&class, &base)?;
            Ok(None)
        }
        "variable" => {
            let class = universe.find_class(expect(rest, 0, "variable CLASS NAME [FLAGS]")?)?;
            let mut decl = VarDecl::new(expect(rest, 1, "variable CLASS NAME [FLAGS]")?);
            let mut extra = rest[2.min(rest.len())..].iter();
            while let Some(flag) = extra.next() {
                match flag.as_str() {
                    "-protected" => decl.protection = Protection::Protected,
                    "-private" => decl.protection = Protection::Private,
                    "-common" => decl.common = true,
                    "-init" => match extra.next() {
                        Some(init) => decl.init = Some(parse_value(init)),
                        None => bail!("-init needs a value"),
                    },
                    other => bail!("unknown variable flag: {}", other),
                }
            }
            universe.define_variable(&class, decl)?;
            Ok(None)
        }
        "method" => {
            let class = universe.find_class(expect(rest, 0, "method CLASS NAME {BODY} [FLAGS]")?)?;
            let name = expect(rest, 1, "method CLASS NAME {BODY} [FLAGS]")?;
            let body = expect(rest, 2, "method CLASS NAME {BODY} [FLAGS]")?;
            let mut decl = MethodDecl::new(name, Code::new(body));
            for flag in &rest[3.min(rest.len())..] {
                match flag.as_str() {
                    "-protected" => decl.protection = Protection::Protected,
                    "-private" => decl.protection = Protection::Private,
                    "-common" => decl.common = true,
                    other => bail!("unknown method flag: {}", other),
                }
            }
            universe.define_method(&class, decl)?;
            Ok(None)
        }
        "constructor" => {
            let class = universe.find_class(expect(rest, 0, "constructor CLASS {BODY}")?)?;
            let body = expect(rest, 1, "constructor CLASS {BODY}")?;
            universe.define_method(&class, MethodDecl::constructor(Code::new(body)))?;
            Ok(None)
        }
        "destructor" => {
            let class = universe.find_class(expect(rest, 0, "destructor CLASS {BODY}")?)?;
            let body = expect(rest, 1, "destructor CLASS {BODY}")?;
            universe.define_method(&class, MethodDecl::destructor(Code::new(body)))?;
            Ok(None)
        }
        "option" => {
            let class = universe.find_class(expect(rest, 0, "option CLASS NAME [DEFAULT]")?)?;
            let name = expect(rest, 1, "option CLASS NAME [DEFAULT]")?;
            let default = rest.get(2).map(|word| parse_value(word));
            universe.define_option(&class, OptionDecl::new(name, default))?;
            Ok(None)
        }
        "component" => {
            let class = universe.find_class(expect(rest, 0, "component CLASS NAME [-inherit]")?)?;
            let name = expect(rest, 1, "component CLASS NAME [-inherit]")?;
            let inherit = rest.get(2).map(String::as_str) == Some("-inherit");
            universe.define_component(
                &class,
                ComponentDecl {
                    name: name.to_string(),
                    inherit,
                },
            )?;
            Ok(None)
        }
        "delegate" => {
            let usage = "delegate CLASS method|option NAME|* COMPONENT [-as NAME] [-using {TPL}] [-except A,B]";
            let class = universe.find_class(expect(rest, 0, usage)?)?;
            let kind = match expect(rest, 1, usage)? {
                "method" => DelegateKind::Method,
                "option" => DelegateKind::Option,
                other => bail!("unknown delegation kind: {}", other),
            };
            let pattern = match expect(rest, 2, usage)? {
                "*" => DelegateName::All,
                name => DelegateName::Exact(name.to_string()),
            };
            let component = expect(rest, 3, usage)?.to_string();
            let mut decl = DelegationDecl {
                kind,
                pattern,
                component,
                to_name: None,
                template: None,
                exceptions: Vec::new(),
            };
            let mut extra = rest[4.min(rest.len())..].iter();
            while let Some(flag) = extra.next() {
                match (flag.as_str(), extra.next()) {
                    ("-as", Some(name)) => decl.to_name = Some(name.to_string()),
                    ("-using", Some(template)) => decl.template = Some(template.to_string()),
                    ("-except", Some(names)) => {
                        decl.exceptions = names.split(',').map(str::to_string).collect()
                    }
                    (flag, _) => bail!("unknown or incomplete delegation flag: {}", flag),
                }
            }
            universe.define_delegation(&class, decl)?;
            Ok(None)
        }
        "new" => {
            let class = expect(rest, 0, "new CLASS HANDLE [ARGS...]")?;
            let handle = expect(rest, 1, "new CLASS HANDLE [ARGS...]")?;
            let args = parse_values(&rest[2.min(rest.len())..]);
            let object = universe.instantiate(class, handle, &args)?;
            let name = object.borrow().name.clone();
            Ok(Some(name))
        }
        "destroy" => {
            universe.delete_object(expect(rest, 0, "destroy HANDLE")?)?;
            Ok(None)
        }
        "delete" => {
            universe.delete_class_named(expect(rest, 0, "delete CLASS")?)?;
            Ok(None)
        }
        "rename" => {
            let old = expect(rest, 0, "rename OLD NEW")?;
            let new = expect(rest, 1, "rename OLD NEW")?;
            universe.rename_object(old, new)?;
            Ok(None)
        }
        "call" => {
            let handle = expect(rest, 0, "call HANDLE METHOD [ARGS...]")?;
            let method = expect(rest, 1, "call HANDLE METHOD [ARGS...]")?;
            let args = parse_values(&rest[2.min(rest.len())..]);
            let result = universe.invoke(handle, method, &args)?;
            Ok(Some(result.to_string()))
        }
        "classcall" => {
            let class = expect(rest, 0, "classcall CLASS METHOD [ARGS...]")?;
            let method = expect(rest, 1, "classcall CLASS METHOD [ARGS...]")?;
            let args = parse_values(&rest[2.min(rest.len())..]);
            let result = universe.invoke_common(class, method, &args)?;
            Ok(Some(result.to_string()))
        }
        "set" => {
            let handle = expect(rest, 0, "set HANDLE VAR VALUE")?;
            let name = expect(rest, 1, "set HANDLE VAR VALUE")?;
            let value = parse_value(expect(rest, 2, "set HANDLE VAR VALUE")?);
            universe.set_variable(handle, name, value)?;
            Ok(None)
        }
        "get" => {
            let handle = expect(rest, 0, "get HANDLE VAR")?;
            let name = expect(rest, 1, "get HANDLE VAR")?;
            Ok(Some(universe.get_variable(handle, name)?.to_string()))
        }
        "classset" => {
            let class = expect(rest, 0, "classset CLASS VAR VALUE")?;
            let name = expect(rest, 1, "classset CLASS VAR VALUE")?;
            let value = parse_value(expect(rest, 2, "classset CLASS VAR VALUE")?);
            universe.set_class_variable(class, name, value)?;
            Ok(None)
        }
        "classget" => {
            let class = expect(rest, 0, "classget CLASS VAR")?;
            let name = expect(rest, 1, "classget CLASS VAR")?;
            Ok(Some(universe.get_class_variable(class, name)?.to_string()))
        }
        "cget" => {
            let handle = expect(rest, 0, "cget HANDLE OPTION")?;
            let option = expect(rest, 1, "cget HANDLE OPTION")?;
            Ok(Some(universe.cget(handle, option)?.to_string()))
        }
        "configure" => {
            let handle = expect(rest, 0, "configure HANDLE OPTION VALUE")?;
            let option = expect(rest, 1, "configure HANDLE OPTION VALUE")?;
            let value = parse_value(expect(rest, 2, "configure HANDLE OPTION VALUE")?);
            universe.configure(handle, option, value)?;
            Ok(None)
        }
        "options" => {
            let handle = expect(rest, 0, "options HANDLE")?;
            let report = universe.configure_report(handle)?;
            let lines: Vec<String> = report
                .iter()
                .map(|(name, value)| format!("{} {}", name, value))
                .collect();
            Ok(Some(lines.join("\n")))
        }
        "bind" => {
            let handle = expect(rest, 0, "bind HANDLE COMPONENT TARGET|-")?;
            let component = expect(rest, 1, "bind HANDLE COMPONENT TARGET|-")?;
            let target = match expect(rest, 2, "bind HANDLE COMPONENT TARGET|-")? {
                "-" => None,
                target => Some(target),
            };
            universe.bind_component(handle, component, target)?;
            Ok(None)
        }
        "canonical" => {
            let class = expect(rest, 0, "canonical CLASS MEMBER")?;
            let member = expect(rest, 1, "canonical CLASS MEMBER")?;
            Ok(Some(universe.canonical_name(class, member)?))
        }
        "info" => info(universe, rest),
        other => bail!("unknown command: {} (try 'help')", other),
    }
}

fn info(universe: &Universe, words: &[String]) -> Result<Option<String>, Error> {
    let (topic, rest) = match words.split_first() {
        Some(split) => split,
        None => bail!("info TOPIC [ARGS...]"),
    };
    let pattern_at = |at: usize| words.get(at + 1).map(String::as_str).unwrap_or("*");
    let listing = match topic.as_str() {
        "classes" => universe.info_classes(pattern_at(0)),
        "objects" => universe.info_objects(pattern_at(0)),
        "heritage" => universe.info_heritage(expect(rest, 0, "info heritage CLASS")?)?,
        "variables" => {
            universe.info_variables(expect(rest, 0, "info variables CLASS [PAT]")?, pattern_at(1))?
        }
        "methods" => {
            universe.info_methods(expect(rest, 0, "info methods CLASS [PAT]")?, pattern_at(1))?
        }
        "options" => {
            universe.info_options(expect(rest, 0, "info options CLASS [PAT]")?, pattern_at(1))?
        }
        "components" => universe
            .info_components(expect(rest, 0, "info components CLASS [PAT]")?, pattern_at(1))?,
        "bindings" => universe
            .component_bindings(expect(rest, 0, "info bindings HANDLE")?)?
            .into_iter()
            .map(|(name, target)| match target {
                Some(target) => format!("{} -> {}", name, target),
                None => format!("{} (unbound)", name),
            })
            .collect(),
        "class" => vec![universe.object_class(expect(rest, 0, "info class HANDLE")?)?],
        "isa" => {
            let handle = expect(rest, 0, "info isa HANDLE CLASS")?;
            let class = expect(rest, 1, "info isa HANDLE CLASS")?;
            vec![universe.is_a(handle, class)?.to_string()]
        }
        other => bail!("unknown info topic: {}", other),
    };
    Ok(Some(listing.join("\n")))
}

fn expect<'a>(words: &'a [String], at: usize, usage: &str) -> Result<&'a str, Error> {
    match words.get(at) {
        Some(word) => Ok(word.as_str()),
        None => bail!("usage: {}", usage),
    }
}

const HELP: &str = "
commands:
  class NAME [plain|value|composite|adapter]
  inherit CLASS BASE
  variable CLASS NAME [-protected|-private] [-common] [-init VALUE]
  method CLASS NAME {BODY} [-protected|-private] [-common]
  constructor CLASS {BODY}
  destructor CLASS {BODY}
  option CLASS NAME [DEFAULT]
  component CLASS NAME [-inherit]
  delegate CLASS method|option NAME|* COMPONENT [-as NAME] [-using {TPL}] [-except A,B]
  new CLASS HANDLE [ARGS...]        destroy HANDLE
  delete CLASS                      rename OLD NEW
  call HANDLE METHOD [ARGS...]      classcall CLASS METHOD [ARGS...]
  set HANDLE VAR VALUE              get HANDLE VAR
  classset CLASS VAR VALUE          classget CLASS VAR
  cget HANDLE OPTION                configure HANDLE OPTION VALUE
  options HANDLE                    bind HANDLE COMPONENT TARGET|-
  canonical CLASS MEMBER            info TOPIC [ARGS...]
  exit

info topics: classes, objects, heritage, variables, methods, options,
components, bindings, class, isa
";
