//! Artifacts - What Gets Generated, and Where
//!
//! The artifact set, the template serving each artifact and the destination
//! path are all pure functions of the registries and the template set.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::functions::Registries;
use crate::schema::{lower_camel_case, upper_camel_case, TypeCategory, TypeSchema};
use crate::templates::TemplateSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Type,
    Function,
    Module,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Definition,
    Test,
    Binding,
    /// Python test exercising a binding artifact.
    BindingTest,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Definition => "definition",
            ArtifactKind::Test => "test",
            ArtifactKind::Binding => "binding",
            ArtifactKind::BindingTest => "binding_test",
        }
    }
}

/// The aggregate python module is addressed under this entity name.
pub const MODULE_ENTITY: &str = "module";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactId {
    pub entity_kind: EntityKind,
    pub entity_name: String,
    pub artifact_kind: ArtifactKind,
}

impl ArtifactId {
    pub fn new(entity_kind: EntityKind, entity_name: &str, artifact_kind: ArtifactKind) -> Self {
        Self {
            entity_kind,
            entity_name: entity_name.to_string(),
            artifact_kind,
        }
    }

    pub fn of_type(name: &str, kind: ArtifactKind) -> Self {
        Self::new(EntityKind::Type, name, kind)
    }

    pub fn of_function(name: &str, kind: ArtifactKind) -> Self {
        Self::new(EntityKind::Function, name, kind)
    }

    pub fn module() -> Self {
        Self::new(EntityKind::Module, MODULE_ENTITY, ArtifactKind::Binding)
    }

    /// Output path relative to the output root.
    pub fn destination(&self) -> PathBuf {
        let lower = lower_camel_case(&self.entity_name);
        let upper = upper_camel_case(&self.entity_name);
        let relative = match (self.entity_kind, self.artifact_kind) {
            (EntityKind::Type, ArtifactKind::Definition) => format!("types/{lower}.h"),
            (EntityKind::Type, ArtifactKind::Test) => format!("types/tests/test{upper}.cpp"),
            (EntityKind::Type, ArtifactKind::Binding) => format!("python/types/bind{upper}.cpp"),
            (EntityKind::Type, ArtifactKind::BindingTest) => format!("python/types/tests/test{upper}.py"),
            (EntityKind::Function, ArtifactKind::Definition) => format!("functions/{lower}.h"),
            (EntityKind::Function, ArtifactKind::Test) => format!("functions/tests/test{upper}.cpp"),
            (EntityKind::Function, ArtifactKind::Binding) => format!("python/functions/bind{upper}.cpp"),
            (EntityKind::Function, ArtifactKind::BindingTest) => format!("python/functions/tests/test{upper}.py"),
            (EntityKind::Module, _) => "python/module.cpp".to_string(),
        };
        PathBuf::from(relative)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entity = match self.entity_kind {
            EntityKind::Type => "type",
            EntityKind::Function => "function",
            EntityKind::Module => "module",
        };
        write!(f, "{entity} '{}' ({})", self.entity_name, self.artifact_kind.as_str())
    }
}

/// Scalars are native on both sides of the language boundary.
pub fn type_has_binding(schema: &TypeSchema) -> bool {
    schema.category != TypeCategory::Scalar
}

pub fn type_template(category: TypeCategory, kind: ArtifactKind) -> String {
    let category = category.as_str();
    let upper = upper_camel_case(category);
    match kind {
        ArtifactKind::Definition => format!("types/{category}Type.h"),
        ArtifactKind::Test => format!("types/tests/test{upper}Type.cpp"),
        ArtifactKind::Binding => format!("python/types/bind{upper}Type.cpp"),
        ArtifactKind::BindingTest => format!("python/types/tests/test{upper}Type.py"),
    }
}

pub fn function_template(name: &str, kind: ArtifactKind) -> String {
    match kind {
        ArtifactKind::Definition => format!("functions/{}.h", lower_camel_case(name)),
        ArtifactKind::Test => format!("functions/tests/test{}.cpp", upper_camel_case(name)),
        ArtifactKind::Binding => "python/functions/bindFunction.cpp".to_string(),
        ArtifactKind::BindingTest => format!("python/functions/tests/test{}.py", upper_camel_case(name)),
    }
}

pub const MODULE_TEMPLATE: &str = "python/module.cpp";

const TYPE_ARTIFACTS: [ArtifactKind; 4] = [
    ArtifactKind::Definition,
    ArtifactKind::Test,
    ArtifactKind::Binding,
    ArtifactKind::BindingTest,
];

/// Function bindings are exercised through the type binding tests.
const FUNCTION_ARTIFACTS: [ArtifactKind; 3] = [ArtifactKind::Definition, ArtifactKind::Test, ArtifactKind::Binding];

/// One (template, entity) rendering obligation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Obligation {
    pub id: ArtifactId,
    pub template: String,
    pub destination: PathBuf,
}

impl Obligation {
    fn new(id: ArtifactId, template: String) -> Self {
        let destination = id.destination();
        Self { id, template, destination }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DestinationCollision {
    pub destination: PathBuf,
    pub artifacts: Vec<ArtifactId>,
}

impl fmt::Display for DestinationCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let artifacts: Vec<_> = self.artifacts.iter().map(|a| a.to_string()).collect();
        write!(f, "{} <- {}", self.destination.display(), artifacts.join(", "))
    }
}

/// The full, ordered artifact set for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactPlan {
    pub obligations: Vec<Obligation>,
}

impl ArtifactPlan {
    pub fn compute(registries: &Registries, templates: &TemplateSet) -> Self {
        let mut obligations = vec![];

        for schema in registries.types.all() {
            for kind in TYPE_ARTIFACTS {
                let binds = matches!(kind, ArtifactKind::Binding | ArtifactKind::BindingTest);
                if binds && !type_has_binding(schema) {
                    continue;
                }
                obligations.push(Obligation::new(
                    ArtifactId::of_type(&schema.name, kind),
                    type_template(schema.category, kind),
                ));
            }
        }

        for function in registries.functions.all() {
            for kind in FUNCTION_ARTIFACTS {
                let template = function_template(&function.name, kind);
                // Function tests without a template are hand-authored.
                if kind == ArtifactKind::Test && !templates.contains(&template) {
                    continue;
                }
                obligations.push(Obligation::new(ArtifactId::of_function(&function.name, kind), template));
            }
        }

        obligations.push(Obligation::new(ArtifactId::module(), MODULE_TEMPLATE.to_string()));
        Self { obligations }
    }

    pub fn len(&self) -> usize {
        self.obligations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty()
    }

    pub fn get(&self, id: &ArtifactId) -> Option<&Obligation> {
        self.obligations.iter().find(|o| &o.id == id)
    }

    /// Every destination shared by more than one artifact, in plan order.
    pub fn collisions(&self) -> Vec<DestinationCollision> {
        let mut by_destination: HashMap<&PathBuf, Vec<&ArtifactId>> = HashMap::new();
        for obligation in &self.obligations {
            by_destination.entry(&obligation.destination).or_default().push(&obligation.id);
        }

        let mut collisions = vec![];
        for obligation in &self.obligations {
            let Some(ids) = by_destination.remove(&obligation.destination) else {
                continue;
            };
            if ids.len() > 1 {
                collisions.push(DestinationCollision {
                    destination: obligation.destination.clone(),
                    artifacts: ids.into_iter().cloned().collect(),
                });
            }
        }
        collisions
    }
}

/// Rendered text per artifact, either fresh from the binder or read back
/// from an output directory.
#[derive(Debug, Clone, Default)]
pub struct RenderedSet {
    texts: BTreeMap<ArtifactId, String>,
}

impl RenderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every planned artifact that exists under `root`. Absent files are
    /// left out; the validator reports what it could not check.
    pub fn read_from(plan: &ArtifactPlan, root: &Path) -> io::Result<Self> {
        let mut set = Self::new();
        for obligation in &plan.obligations {
            match std::fs::read_to_string(root.join(&obligation.destination)) {
                Ok(text) => set.insert(obligation.id.clone(), text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(set)
    }

    pub fn insert(&mut self, id: ArtifactId, text: String) {
        self.texts.insert(id, text);
    }

    pub fn get(&self, id: &ArtifactId) -> Option<&str> {
        self.texts.get(id).map(String::as_str)
    }

    pub fn get_type(&self, name: &str, kind: ArtifactKind) -> Option<&str> {
        self.get(&ArtifactId::of_type(name, kind))
    }

    pub fn get_function(&self, name: &str, kind: ArtifactKind) -> Option<&str> {
        self.get(&ArtifactId::of_function(name, kind))
    }

    pub fn module(&self) -> Option<&str> {
        self.get(&ArtifactId::module())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArtifactId, &str)> {
        self.texts.iter().map(|(id, text)| (id, text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}
