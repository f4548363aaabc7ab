use crate::models::all_models::Role;
use std::collections::HashMap;
use thiserror::Error;

/// Roles allowed to invoke one operation. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequirement {
    roles: Vec<Role>,
}

impl RoleRequirement {
    pub fn permits(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    #[cfg(test)]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}

/// One declared operation: `None` marks it public.
pub type OperationDecl = (&'static str, Option<&'static [Role]>);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("operation `{0}` declares an empty role set")]
    EmptyRequirement(&'static str),
    #[error("operation `{0}` is declared more than once")]
    Duplicate(&'static str),
}

/// Operation id -> requirement table, fixed at startup.
#[derive(Debug)]
pub struct RoleRegistry {
    requirements: Vec<Option<RoleRequirement>>,
    index: HashMap<&'static str, usize>,
}

impl RoleRegistry {
    pub fn build<'a, I>(declarations: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = &'a OperationDecl>,
    {
        let mut requirements = Vec::new();
        let mut index = HashMap::new();

        for &(operation_id, roles) in declarations {
            if index.contains_key(operation_id) {
                return Err(RegistryError::Duplicate(operation_id));
            }

            let requirement = match roles {
                None => None,
                Some([]) => return Err(RegistryError::EmptyRequirement(operation_id)),
                Some(declared) => {
                    let mut roles = Vec::with_capacity(declared.len());
                    for role in declared {
                        if !roles.contains(role) {
                            roles.push(*role);
                        }
                    }
                    Some(RoleRequirement { roles })
                }
            };

            index.insert(operation_id, requirements.len());
            requirements.push(requirement);
        }

        Ok(RoleRegistry {
            requirements,
            index,
        })
    }

    /// Exact-match lookup. `None` means the operation is public.
    pub fn requirement_for(&self, operation_id: &str) -> Option<&RoleRequirement> {
        self.index
            .get(operation_id)
            .and_then(|&slot| self.requirements[slot].as_ref())
    }

    #[cfg(test)]
    pub fn is_declared(&self, operation_id: &str) -> bool {
        self.index.contains_key(operation_id)
    }
}
