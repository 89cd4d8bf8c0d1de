use thiserror::Error;

/// Every way a declaration, resolution or lifecycle operation can fail.
#[derive(Debug, Error)]
pub enum ObjError {
    /// A class or command already occupies the requested path.
    #[error("name collision: '{name}' already exists")]
    NameCollision {
        /// The disputed path.
        name: String,
    },
    /// The requested name is not a legal path tail.
    #[error("invalid name: '{name}'")]
    InvalidName {
        /// The offending name.
        name: String,
    },
    /// Adding the base would make the class an ancestor of itself.
    #[error("inheritance cycle: '{base}' is already derived from '{class}'")]
    CycleDetected {
        /// The class being extended.
        class: String,
        /// The base that would close the cycle.
        base: String,
    },
    /// The class already declares a member under that name.
    #[error("'{member}' is already defined in class '{class}'")]
    MemberAlreadyDefined {
        /// The declaring class.
        class: String,
        /// The duplicated member name.
        member: String,
    },
    /// No member resolves under the given spelling.
    #[error("no such member: '{name}'")]
    NoSuchMember {
        /// The spelling that failed to resolve.
        name: String,
    },
    /// The member resolved, but the requesting scope may not touch it.
    #[error("access denied: '{member}' is {protection} from '{scope}'")]
    AccessDenied {
        /// The member's full name.
        member: String,
        /// The member's declared visibility.
        protection: String,
        /// Where the access came from.
        scope: String,
    },
    /// A constructor in the chain failed; the object was rolled back.
    #[error("construction of '{class}' failed")]
    ConstructionFailed {
        /// The ancestor class whose constructor failed.
        class: String,
        /// Why it failed.
        #[source]
        source: Box<ObjError>,
    },
    /// The object is mid-teardown and cannot service the operation.
    #[error("object '{object}' is being destroyed")]
    DestructionInProgress {
        /// The object's handle path.
        object: String,
    },
    /// An instance operation was invoked with no instance context.
    #[error("no object context for '{name}'")]
    MissingObjectContext {
        /// The member that needed an instance.
        name: String,
    },
    /// No class is registered under the given path.
    #[error("no such class: '{name}'")]
    NoSuchClass {
        /// The path that failed to resolve.
        name: String,
    },
    /// No object is published under the given handle path.
    #[error("no such object: '{name}'")]
    NoSuchObject {
        /// The handle that failed to resolve.
        name: String,
    },
    /// The class kind carries no options bag.
    #[error("class '{class}' does not accept options")]
    OptionsUnsupported {
        /// The optionless class.
        class: String,
    },
    /// A forward hit a component with nothing bound to it.
    #[error("component '{component}' is not bound")]
    UnboundComponent {
        /// The empty component slot.
        component: String,
    },
    /// Forwarding chased delegation rules past the depth limit, which
    /// means the components form a cycle.
    #[error("delegation loop while forwarding '{name}'")]
    DelegationLoop {
        /// The name whose forwarding never terminated.
        name: String,
    },
    /// A delegation rule's rewrite template does not parse.
    #[error("invalid delegation template: {detail}")]
    InvalidTemplate {
        /// What was wrong with it.
        detail: String,
    },
    /// The host failed to evaluate a body.
    #[error("{0}")]
    Eval(String),
}

/// Convenience alias used throughout the runtime.
pub type Result<T> = std::result::Result<T, ObjError>;
