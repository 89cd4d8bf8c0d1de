use std::fmt;

use objkit_core::decl::{Code, DelegateKind, DelegateName, MethodFlavor, Protection};
use objkit_core::template::ForwardTemplate;
use objkit_core::value::Value;

use crate::class::Class;
use crate::ObjWeakRef;

/// Marks the members every class (or option-bearing class) gets for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// The self-reference member, always storage slot 0.
    SelfRef,
    /// The options bag, always storage slot 1 when present.
    OptionsBag,
    /// The hull identity of composite/adapter classes.
    Hull,
}

/// Represents a declared data member.
pub struct Variable {
    /// The member's bare name.
    pub name: String,
    /// The member's fully scoped name (e.g. `::shapes::Circle::radius`).
    pub full_name: String,
    /// Its visibility.
    pub protection: Protection,
    /// Whether the member is class-scoped (shared by all instances).
    pub common: bool,
    /// The value bound when storage is allocated.
    pub init: Option<Value>,
    /// A hook body run by the host after every write.
    pub update_hook: Option<Code>,
    /// Which built-in role this member plays, if any.
    pub builtin: Option<Builtin>,
    /// The declaring class.
    pub holder: ObjWeakRef<Class>,
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("full_name", &self.full_name)
            .field("protection", &self.protection)
            .field("common", &self.common)
            .finish()
    }
}

/// Represents a declared method.
pub struct Method {
    /// The method's bare name.
    pub name: String,
    /// The method's fully scoped name.
    pub full_name: String,
    /// Its visibility.
    pub protection: Protection,
    /// Whether the method is class-scoped (no instance context).
    pub common: bool,
    /// Constructor/destructor marker.
    pub flavor: MethodFlavor,
    /// The method body, or `None` for a declared-but-not-implemented method.
    pub body: Option<Code>,
    /// A hook body run before the main body.
    pub pre: Option<Code>,
    /// A hook body run after the main body.
    pub post: Option<Code>,
    /// The declaring class.
    pub holder: ObjWeakRef<Class>,
}

impl Method {
    /// Whether this method is a constructor.
    pub fn is_constructor(&self) -> bool {
        self.flavor == MethodFlavor::Constructor
    }

    /// Whether this method is a destructor.
    pub fn is_destructor(&self) -> bool {
        self.flavor == MethodFlavor::Destructor
    }

    /// Whether this method takes part in ordinary by-name dispatch.
    pub fn is_dispatchable(&self) -> bool {
        self.flavor == MethodFlavor::Normal
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("full_name", &self.full_name)
            .field("protection", &self.protection)
            .field("flavor", &self.flavor)
            .finish()
    }
}

/// Represents a declared configuration option.
pub struct OptionSpec {
    /// The option's name, without any leading dash.
    pub name: String,
    /// The option's fully scoped name.
    pub full_name: String,
    /// The value bound when an instance does not configure the option.
    pub default: Option<Value>,
    /// A hook body run by the host after the option is configured.
    pub config_hook: Option<Code>,
    /// A hook body run by the host to vet a value before it is stored.
    pub validate_hook: Option<Code>,
    /// The declaring class.
    pub holder: ObjWeakRef<Class>,
}

impl fmt::Debug for OptionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionSpec")
            .field("full_name", &self.full_name)
            .finish()
    }
}

/// Represents a declared component slot.
pub struct ComponentDef {
    /// The component's name.
    pub name: String,
    /// The component's fully scoped name.
    pub full_name: String,
    /// Whether derived classes may rebind this slot.
    pub inherit: bool,
    /// The declaring class.
    pub holder: ObjWeakRef<Class>,
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef")
            .field("full_name", &self.full_name)
            .field("inherit", &self.inherit)
            .finish()
    }
}

/// Represents a declared forwarding rule.
pub struct Delegation {
    /// Whether methods or options are forwarded.
    pub kind: DelegateKind,
    /// The claimed name, or the wildcard.
    pub pattern: DelegateName,
    /// The component slot whose bound object receives the forward.
    pub component: String,
    /// The name sent to the target instead of the forwarded name itself.
    pub to_name: Option<String>,
    /// The parsed argument-rewrite template, if any.
    pub template: Option<ForwardTemplate>,
    /// Names a wildcard rule does not claim.
    pub exceptions: Vec<String>,
    /// The declaring class.
    pub holder: ObjWeakRef<Class>,
}

impl Delegation {
    /// Whether this rule claims the given name outright.
    pub fn claims(&self, name: &str) -> bool {
        match &self.pattern {
            DelegateName::Exact(exact) => exact == name,
            DelegateName::All => false,
        }
    }

    /// Whether this rule is a wildcard that admits the given name.
    pub fn admits(&self, name: &str) -> bool {
        match &self.pattern {
            DelegateName::Exact(_) => false,
            DelegateName::All => !self.exceptions.iter().any(|except| except == name),
        }
    }

    /// The name actually sent to the target for a given forwarded name.
    pub fn outgoing_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.to_name.as_deref().unwrap_or(name)
    }
}

impl fmt::Debug for Delegation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegation")
            .field("kind", &self.kind)
            .field("pattern", &self.pattern)
            .field("component", &self.component)
            .finish()
    }
}
