//! Cross-file symbol index
//!
//! Every file contributes a [`FileMeta`]. The index keeps the per-file maps so
//! that a file's contributions can be retracted exactly, plus merged lookup
//! maps in which the declaration with the larger span wins.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use super::builtins;
use super::class_info::{ClassInfo, ConstInfo};
use super::function_info::{ElementPosition, FunctionInfo};
use crate::types::TypeSet;

/// Reserved file name for the builtin declarations
pub const BUILTIN_FILE: &str = "<builtin>";

/// Errors from mutating the index
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("symbol index is frozen: indexing is already complete")]
    IndexingComplete,
}

/// Symbols declared by one file
#[derive(Debug, Clone, Default)]
pub struct FileMeta {
    /// Classes, interfaces and enums keyed by lowercase name
    pub classes: HashMap<String, ClassInfo>,
    /// Traits keyed by lowercase name
    pub traits: HashMap<String, ClassInfo>,
    /// Functions keyed by lowercase name
    pub functions: HashMap<String, FunctionInfo>,
    /// Global constants keyed by exact name
    pub constants: HashMap<String, ConstInfo>,
    /// Variables of the pseudo-main scope, names including `$`
    pub globals: HashMap<String, TypeSet>,
}

impl FileMeta {
    /// Create a new, empty file meta
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, info: ClassInfo) {
        let key = symbol_key(&info.name);
        if info.is_trait() {
            self.traits.insert(key, info);
        } else {
            self.classes.insert(key, info);
        }
    }

    pub fn add_function(&mut self, info: FunctionInfo) {
        self.functions.insert(symbol_key(&info.name), info);
    }

    pub fn add_constant(&mut self, name: &str, info: ConstInfo) {
        self.constants.insert(absolute(name), info);
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
            && self.traits.is_empty()
            && self.functions.is_empty()
            && self.constants.is_empty()
            && self.globals.is_empty()
    }
}

/// Counts reported after indexing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub files: usize,
    pub classes: usize,
    pub traits: usize,
    pub functions: usize,
    pub constants: usize,
}

#[derive(Debug, Default)]
struct IndexState {
    per_file: BTreeMap<String, FileMeta>,
    classes: HashMap<String, Arc<ClassInfo>>,
    traits: HashMap<String, Arc<ClassInfo>>,
    functions: HashMap<String, Arc<FunctionInfo>>,
    constants: HashMap<String, Arc<ConstInfo>>,
}

/// Registry of every class, trait, function and constant of the project.
///
/// Mutation happens while indexing; once [`SymbolIndex::set_indexing_complete`]
/// is called the index only serves lookups and mutations return
/// [`IndexError::IndexingComplete`].
#[derive(Debug, Default)]
pub struct SymbolIndex {
    state: RwLock<IndexState>,
    indexing_complete: AtomicBool,
}

impl SymbolIndex {
    /// Create a new, empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Index holding the builtin class hierarchy
    pub fn with_builtins() -> Self {
        let index = Self::new();
        {
            let mut state = index.write();
            insert_file(&mut state, BUILTIN_FILE, builtins::builtin_meta());
        }
        index
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_indexing_complete(&self) -> bool {
        self.indexing_complete.load(Ordering::SeqCst)
    }

    /// Freeze or unfreeze the index
    pub fn set_indexing_complete(&self, complete: bool) {
        let _state = self.write();
        self.indexing_complete.store(complete, Ordering::SeqCst);
    }

    /// Add the symbols of `filename`, keeping larger declarations on conflict
    pub fn add_file_meta(&self, filename: &str, meta: FileMeta) -> Result<(), IndexError> {
        let mut state = self.write();
        self.ensure_mutable()?;
        insert_file(&mut state, filename, meta);
        Ok(())
    }

    /// Retract everything `filename` contributed
    pub fn delete_meta_for_file(&self, filename: &str) -> Result<(), IndexError> {
        let mut state = self.write();
        self.ensure_mutable()?;
        remove_file(&mut state, filename);
        Ok(())
    }

    /// Delete and add in one critical section
    pub fn replace_file_meta(&self, filename: &str, meta: FileMeta) -> Result<(), IndexError> {
        let mut state = self.write();
        self.ensure_mutable()?;
        remove_file(&mut state, filename);
        insert_file(&mut state, filename, meta);
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), IndexError> {
        if self.is_indexing_complete() {
            Err(IndexError::IndexingComplete)
        } else {
            Ok(())
        }
    }

    pub fn get_class(&self, name: &str) -> Option<Arc<ClassInfo>> {
        self.read().classes.get(&symbol_key(name)).cloned()
    }

    pub fn get_trait(&self, name: &str) -> Option<Arc<ClassInfo>> {
        self.read().traits.get(&symbol_key(name)).cloned()
    }

    pub fn get_class_or_trait(&self, name: &str) -> Option<Arc<ClassInfo>> {
        let key = symbol_key(name);
        let state = self.read();
        state
            .classes
            .get(&key)
            .or_else(|| state.traits.get(&key))
            .cloned()
    }

    pub fn get_function(&self, name: &str) -> Option<Arc<FunctionInfo>> {
        self.read().functions.get(&symbol_key(name)).cloned()
    }

    pub fn get_constant(&self, name: &str) -> Option<Arc<ConstInfo>> {
        self.read().constants.get(&absolute(name)).cloned()
    }

    /// Union of the types a pseudo-main variable has across all files
    pub fn get_global_var(&self, name: &str) -> Option<TypeSet> {
        let state = self.read();
        let mut result: Option<TypeSet> = None;
        for meta in state.per_file.values() {
            if let Some(types) = meta.globals.get(name) {
                result
                    .get_or_insert_with(TypeSet::new)
                    .append(types);
            }
        }
        result
    }

    /// Snapshot of what `filename` contributed
    pub fn get_meta_for_file(&self, filename: &str) -> Option<FileMeta> {
        self.read().per_file.get(filename).cloned()
    }

    /// Names of the indexed files, the builtin file included
    pub fn files(&self) -> Vec<String> {
        self.read().per_file.keys().cloned().collect()
    }

    pub fn file_exists(&self, filename: &str) -> bool {
        self.read().per_file.contains_key(filename)
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.read();
        IndexStats {
            files: state.per_file.len(),
            classes: state.classes.len(),
            traits: state.traits.len(),
            functions: state.functions.len(),
            constants: state.constants.len(),
        }
    }
}

fn insert_file(state: &mut IndexState, filename: &str, meta: FileMeta) {
    for (key, info) in &meta.classes {
        insert_larger(&mut state.classes, key, info, |i| &i.pos);
    }
    for (key, info) in &meta.traits {
        insert_larger(&mut state.traits, key, info, |i| &i.pos);
    }
    for (key, info) in &meta.functions {
        insert_larger(&mut state.functions, key, info, |i| &i.pos);
    }
    for (key, info) in &meta.constants {
        insert_larger(&mut state.constants, key, info, |i| &i.pos);
    }
    state.per_file.insert(filename.to_string(), meta);
}

/// Strictly larger declarations replace; on a tie the first one stays
fn insert_larger<T: Clone>(
    map: &mut HashMap<String, Arc<T>>,
    key: &str,
    info: &T,
    pos: impl Fn(&T) -> &ElementPosition,
) {
    let replace = match map.get(key) {
        Some(existing) => pos(info).length() > pos(existing).length(),
        None => true,
    };
    if replace {
        map.insert(key.to_string(), Arc::new(info.clone()));
    }
}

fn remove_file(state: &mut IndexState, filename: &str) {
    let old = match state.per_file.remove(filename) {
        Some(old) => old,
        None => return,
    };

    for key in old.classes.keys() {
        if owned_by(&state.classes, key, filename, |i| &i.pos) {
            state.classes.remove(key);
            let replacement = best_remaining(&state.per_file, |m| m.classes.get(key), |i| &i.pos);
            if let Some(info) = replacement {
                state.classes.insert(key.clone(), info);
            }
        }
    }
    for key in old.traits.keys() {
        if owned_by(&state.traits, key, filename, |i| &i.pos) {
            state.traits.remove(key);
            let replacement = best_remaining(&state.per_file, |m| m.traits.get(key), |i| &i.pos);
            if let Some(info) = replacement {
                state.traits.insert(key.clone(), info);
            }
        }
    }
    for key in old.functions.keys() {
        if owned_by(&state.functions, key, filename, |i| &i.pos) {
            state.functions.remove(key);
            let replacement = best_remaining(&state.per_file, |m| m.functions.get(key), |i| &i.pos);
            if let Some(info) = replacement {
                state.functions.insert(key.clone(), info);
            }
        }
    }
    for key in old.constants.keys() {
        if owned_by(&state.constants, key, filename, |i| &i.pos) {
            state.constants.remove(key);
            let replacement = best_remaining(&state.per_file, |m| m.constants.get(key), |i| &i.pos);
            if let Some(info) = replacement {
                state.constants.insert(key.clone(), info);
            }
        }
    }
}

fn owned_by<T>(
    map: &HashMap<String, Arc<T>>,
    key: &str,
    filename: &str,
    pos: impl Fn(&T) -> &ElementPosition,
) -> bool {
    map.get(key)
        .map(|info| pos(info).filename == filename)
        .unwrap_or(false)
}

/// Largest remaining declaration, earlier files winning ties
fn best_remaining<'m, T: Clone + 'm>(
    per_file: &'m BTreeMap<String, FileMeta>,
    get: impl Fn(&'m FileMeta) -> Option<&'m T>,
    pos: impl Fn(&T) -> &ElementPosition,
) -> Option<Arc<T>> {
    let mut best: Option<&T> = None;
    for meta in per_file.values() {
        if let Some(info) = get(meta) {
            let better = match best {
                Some(current) => pos(info).length() > pos(current).length(),
                None => true,
            };
            if better {
                best = Some(info);
            }
        }
    }
    best.map(|info| Arc::new(info.clone()))
}

/// Lowercase key with a leading `\`
pub fn symbol_key(name: &str) -> String {
    absolute(name).to_ascii_lowercase()
}

fn absolute(name: &str) -> String {
    if name.starts_with('\\') {
        name.to_string()
    } else {
        format!("\\{}", name)
    }
}
