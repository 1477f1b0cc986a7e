// src/services/hierarchy.rs

use std::collections::{HashMap, HashSet};

use crate::models::catalog::RawGroupRow;

pub const PATH_SEPARATOR: &str = "->";

/// Pai resolvido, profundidade (raiz = 1) e caminho materializado raiz->...->grupo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHierarchy {
    pub parent_group_code: String,
    pub nested_level: i32,
    pub path: String,
}

impl ResolvedHierarchy {
    fn root(code: &str) -> Self {
        Self {
            parent_group_code: code.to_string(),
            nested_level: 1,
            path: code.to_string(),
        }
    }
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Resolve a hierarquia de todos os grupos de uma filial a partir das linhas planas.
/// O resultado tem a mesma ordem da entrada.
///
/// - pai em branco ou igual ao próprio código: raiz;
/// - pai declarado que não existe entre as linhas: tratado como raiz;
/// - ciclos são cortados na primeira repetição (caminho parcial, finito).
pub fn resolve_hierarchy(rows: &[RawGroupRow]) -> Vec<ResolvedHierarchy> {
    // código -> pai declarado (a primeira ocorrência de um código vence)
    let mut parents: HashMap<&str, Option<&str>> = HashMap::with_capacity(rows.len());
    for row in rows {
        let code = non_blank(row.group_code.as_ref()).unwrap_or_default();
        parents
            .entry(code)
            .or_insert_with(|| non_blank(row.parent_group_code.as_ref()));
    }

    rows.iter()
        .map(|row| {
            let code = non_blank(row.group_code.as_ref()).unwrap_or_default();
            resolve_one(code, non_blank(row.parent_group_code.as_ref()), &parents)
        })
        .collect()
}

fn resolve_one(
    code: &str,
    parent: Option<&str>,
    parents: &HashMap<&str, Option<&str>>,
) -> ResolvedHierarchy {
    let Some(parent) = parent.filter(|p| *p != code) else {
        return ResolvedHierarchy::root(code);
    };
    if !parents.contains_key(parent) {
        return ResolvedHierarchy::root(code);
    }

    // Sobe pela cadeia de pais; `chain` guarda do grupo até o ancestral mais alto.
    let mut chain = vec![code];
    let mut visited: HashSet<&str> = HashSet::from([code]);
    let mut current = parent;

    while visited.insert(current) {
        let Some(next) = parents.get(current) else {
            break;
        };
        chain.push(current);
        match *next {
            Some(next) if next != current => current = next,
            _ => break,
        }
    }

    chain.reverse();
    ResolvedHierarchy {
        parent_group_code: parent.to_string(),
        nested_level: i32::try_from(chain.len()).unwrap_or(i32::MAX),
        path: chain.join(PATH_SEPARATOR),
    }
}
