//! Named-parameter blocks handed to external shader programs, and the
//! renderer material list they are attached to.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec4;

/// Process-unique identity of a parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialHandle(u64);

impl MaterialHandle {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 { self.0 }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Int(i32),
    Color(Vec4),
}

/// Parameter container for one shader program.
///
/// Cloning copies the parameters under a fresh handle, so the clone is a
/// separate material.
#[derive(Debug)]
pub struct MaterialParameterBlock {
    handle: MaterialHandle,
    program: &'static str,
    params: BTreeMap<&'static str, ParamValue>,
    keywords: BTreeSet<&'static str>,
}

impl MaterialParameterBlock {
    pub fn new(program: &'static str) -> Self {
        Self { handle: MaterialHandle::next(), program, params: BTreeMap::new(), keywords: BTreeSet::new() }
    }

    pub fn handle(&self) -> MaterialHandle { self.handle }
    pub fn program(&self) -> &'static str { self.program }

    pub fn set_float(&mut self, name: &'static str, value: f32) { self.params.insert(name, ParamValue::Float(value)); }
    pub fn set_int(&mut self, name: &'static str, value: i32) { self.params.insert(name, ParamValue::Int(value)); }
    pub fn set_color(&mut self, name: &'static str, value: Vec4) { self.params.insert(name, ParamValue::Color(value)); }

    pub fn set_keyword(&mut self, keyword: &'static str, enabled: bool) {
        if enabled {
            self.keywords.insert(keyword);
        } else {
            self.keywords.remove(keyword);
        }
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> { self.params.get(name).copied() }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.get(name)? { ParamValue::Float(v) => Some(v), _ => None }
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.get(name)? { ParamValue::Int(v) => Some(v), _ => None }
    }

    pub fn color(&self, name: &str) -> Option<Vec4> {
        match self.get(name)? { ParamValue::Color(v) => Some(v), _ => None }
    }

    pub fn keyword_enabled(&self, keyword: &str) -> bool { self.keywords.contains(keyword) }
    pub fn params(&self) -> impl Iterator<Item = (&'static str, ParamValue)> + '_ {
        self.params.iter().map(|(k, v)| (*k, *v))
    }
}

impl Clone for MaterialParameterBlock {
    fn clone(&self) -> Self {
        Self {
            handle: MaterialHandle::next(),
            program: self.program,
            params: self.params.clone(),
            keywords: self.keywords.clone(),
        }
    }
}

/// Ordered material slots of one rendered surface.
pub trait MaterialList {
    fn materials(&self) -> &[MaterialHandle];
    fn push_material(&mut self, handle: MaterialHandle);
    /// Remove the first occurrence of `handle`; returns whether one was found.
    fn remove_material(&mut self, handle: MaterialHandle) -> bool;

    fn contains_material(&self, handle: MaterialHandle) -> bool {
        self.materials().contains(&handle)
    }
}

impl<T: MaterialList + ?Sized> MaterialList for &mut T {
    fn materials(&self) -> &[MaterialHandle] { (**self).materials() }
    fn push_material(&mut self, handle: MaterialHandle) { (**self).push_material(handle) }
    fn remove_material(&mut self, handle: MaterialHandle) -> bool { (**self).remove_material(handle) }
}

/// Plain in-memory material list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceRenderer {
    pub name: String,
    pub slots: Vec<MaterialHandle>,
}

impl SurfaceRenderer {
    pub fn new(name: impl Into<String>, slots: Vec<MaterialHandle>) -> Self {
        Self { name: name.into(), slots }
    }
}

impl MaterialList for SurfaceRenderer {
    fn materials(&self) -> &[MaterialHandle] { &self.slots }
    fn push_material(&mut self, handle: MaterialHandle) { self.slots.push(handle); }
    fn remove_material(&mut self, handle: MaterialHandle) -> bool {
        match self.slots.iter().position(|h| *h == handle) {
            Some(i) => {
                self.slots.remove(i);
                true
            }
            None => false,
        }
    }
}
