use std::fmt;
use std::rc::Rc;

use crate::value::Value;

/// The kind of a declared class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// A plain class: data members and methods only.
    Plain,
    /// A value-type class: plain, plus value-identity built-ins.
    ValueType,
    /// A composite class: owns sub-objects, carries an options bag and a hull.
    Composite,
    /// An adapter class: wraps one existing object, carries an options bag and a hull.
    Adapter,
}

impl ClassKind {
    /// Whether classes of this kind carry an options bag and accept options.
    pub fn has_options(self) -> bool {
        matches!(self, Self::Composite | Self::Adapter)
    }
}

/// Member visibility, checked at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    /// Accessible from anywhere.
    Public,
    /// Accessible from the declaring class and its heritage.
    Protected,
    /// Accessible from the declaring class only.
    Private,
}

impl Default for Protection {
    fn default() -> Self {
        Self::Public
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Protected => write!(f, "protected"),
            Self::Private => write!(f, "private"),
        }
    }
}

/// An opaque body handle.
///
/// The runtime never looks inside: bodies are handed to the host for
/// execution as-is. Cloning is cheap (shared allocation).
#[derive(Clone, PartialEq, Eq)]
pub struct Code(Rc<str>);

impl Code {
    /// Wrap a body for later execution by the host.
    pub fn new(source: impl Into<Rc<str>>) -> Self {
        Self(source.into())
    }

    /// The body text, as handed in at declaration time.
    pub fn source(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code({:?})", &*self.0)
    }
}

/// Declaration of a data member.
#[derive(Debug, Clone)]
pub struct VarDecl {
    /// The member's bare name.
    pub name: String,
    /// Its visibility.
    pub protection: Protection,
    /// Whether the member is class-scoped (shared by all instances).
    pub common: bool,
    /// The initial value bound at instance (or class) creation.
    pub init: Option<Value>,
    /// A hook body run by the host after every write to the member.
    pub update_hook: Option<Code>,
}

impl VarDecl {
    /// A public, per-instance variable with no initializer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protection: Protection::Public,
            common: false,
            init: None,
            update_hook: None,
        }
    }
}

/// What role a method plays in the instance lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodFlavor {
    /// An ordinary method.
    Normal,
    /// The class's constructor; never dispatched by name.
    Constructor,
    /// The class's destructor; never dispatched by name.
    Destructor,
}

/// Declaration of a callable member.
#[derive(Debug, Clone)]
pub struct MethodDecl {
    /// The method's bare name.
    pub name: String,
    /// Its visibility.
    pub protection: Protection,
    /// Whether the method is class-scoped (no instance context).
    pub common: bool,
    /// Constructor/destructor marker.
    pub flavor: MethodFlavor,
    /// The method body, or `None` for a declared-but-not-implemented method.
    pub body: Option<Code>,
    /// A hook body run before the main body, in the same call frame.
    pub pre: Option<Code>,
    /// A hook body run after the main body, in the same call frame.
    pub post: Option<Code>,
}

impl MethodDecl {
    /// A public, ordinary method with the given body.
    pub fn new(name: impl Into<String>, body: Code) -> Self {
        Self {
            name: name.into(),
            protection: Protection::Public,
            common: false,
            flavor: MethodFlavor::Normal,
            body: Some(body),
            pre: None,
            post: None,
        }
    }

    /// A constructor declaration with the given body.
    pub fn constructor(body: Code) -> Self {
        Self {
            name: "constructor".to_string(),
            protection: Protection::Public,
            common: false,
            flavor: MethodFlavor::Constructor,
            body: Some(body),
            pre: None,
            post: None,
        }
    }

    /// A destructor declaration with the given body.
    pub fn destructor(body: Code) -> Self {
        Self {
            name: "destructor".to_string(),
            protection: Protection::Public,
            common: false,
            flavor: MethodFlavor::Destructor,
            body: Some(body),
            pre: None,
            post: None,
        }
    }
}

/// Declaration of a configuration option.
#[derive(Debug, Clone)]
pub struct OptionDecl {
    /// The option's name, without any leading dash.
    pub name: String,
    /// The value bound when an instance does not configure the option.
    pub default: Option<Value>,
    /// A hook body run by the host after the option is configured.
    pub config_hook: Option<Code>,
    /// A hook body run by the host to vet a value before it is stored.
    pub validate_hook: Option<Code>,
}

impl OptionDecl {
    /// An option with a default value and no hooks.
    pub fn new(name: impl Into<String>, default: Option<Value>) -> Self {
        Self {
            name: name.into(),
            default,
            config_hook: None,
            validate_hook: None,
        }
    }
}

/// Declaration of a component slot.
#[derive(Debug, Clone)]
pub struct ComponentDecl {
    /// The component's name.
    pub name: String,
    /// Whether derived classes may rebind this slot (`true`) or it is
    /// private to the declaring class (`false`).
    pub inherit: bool,
}

/// Which member category a delegation rule forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegateKind {
    /// Forwards method invocations.
    Method,
    /// Forwards option accesses.
    Option,
}

/// What names a delegation rule claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateName {
    /// A single, exact name.
    Exact(String),
    /// Every name not otherwise claimed (the wildcard rule).
    All,
}

/// Declaration of a forwarding rule.
#[derive(Debug, Clone)]
pub struct DelegationDecl {
    /// Whether methods or options are forwarded.
    pub kind: DelegateKind,
    /// The claimed name, or the wildcard.
    pub pattern: DelegateName,
    /// The component slot whose bound object receives the forward.
    pub component: String,
    /// A substitution override: the name sent to the target instead of the
    /// forwarded name itself.
    pub to_name: Option<String>,
    /// The argument-rewrite template source, if any.
    pub template: Option<String>,
    /// Names a wildcard rule does not claim.
    pub exceptions: Vec<String>,
}

impl DelegationDecl {
    /// Forward a single method name verbatim to a component.
    pub fn method(name: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            kind: DelegateKind::Method,
            pattern: DelegateName::Exact(name.into()),
            component: component.into(),
            to_name: None,
            template: None,
            exceptions: Vec::new(),
        }
    }

    /// Forward every method not named in `exceptions` to a component.
    pub fn all_methods(component: impl Into<String>, exceptions: Vec<String>) -> Self {
        Self {
            kind: DelegateKind::Method,
            pattern: DelegateName::All,
            component: component.into(),
            to_name: None,
            template: None,
            exceptions,
        }
    }

    /// Forward a single option name verbatim to a component.
    pub fn option(name: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            kind: DelegateKind::Option,
            pattern: DelegateName::Exact(name.into()),
            component: component.into(),
            to_name: None,
            template: None,
            exceptions: Vec::new(),
        }
    }
}
