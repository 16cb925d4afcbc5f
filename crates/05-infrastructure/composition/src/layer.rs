//! 分层组合上下文
//!
//! [`LayerContext`] 把多个独立构建的容器组合成一个可见的上下文。根层持有自己的容器和
//! 子层列表，可以是开放的（创建尚未被任何层占有的组件）或封闭的（只委托，不创建）。
//!
//! 所有查找都在根上按同一协议进行：
//! 1. 跳过发起请求的层；
//! 2. 标识在某个层的导出集合中，委托给该层的容器；
//! 3. 根层开放、且没有任何子层占有该标识时，由根层容器创建；
//! 4. 否则未找到。

use crate::exports::ExportSet;
use di_abstractions::{
    ComponentRef, DependencyContext, FactoryContext, Instance, LayerImport, Layerable,
};
use di_common::{ContainerId, DependencyError, DependencyResult, TypeKey};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

struct Layer {
    container: Arc<dyn Layerable>,
    exports: ExportSet,
}

/// 分层组合上下文
pub struct LayerContext {
    root: Arc<dyn Layerable>,
    open: bool,
    layers: Vec<Layer>,
}

impl LayerContext {
    /// 以 `root` 为根层容器创建构建器
    pub fn builder(root: Arc<dyn Layerable>) -> LayerContextBuilder {
        LayerContextBuilder::new(root)
    }

    /// 根层是否开放
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// 子层数量
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// 指定子层的导出快照
    pub fn exports_of(&self, container: ContainerId) -> Option<&ExportSet> {
        self.layers
            .iter()
            .find(|layer| layer.container.container_id() == container)
            .map(|layer| &layer.exports)
    }

    /// 按类型查找，未找到返回 `None`
    pub fn find_by_type(&self, key: &TypeKey) -> DependencyResult<Option<Instance>> {
        self.lookup_type(key, None)
    }

    /// 按名称查找
    pub fn find_by_name(&self, name: &str) -> DependencyResult<Option<Instance>> {
        self.lookup_name(name, None)
    }

    /// 按父类型查找全部可见的多实现
    pub fn find_by_supertype(&self, key: &TypeKey) -> DependencyResult<Vec<ComponentRef>> {
        self.lookup_supertype(key, None)
    }

    /// 关闭根层容器和所有子层容器，返回第一个错误
    pub fn close(&self) -> DependencyResult<()> {
        info!(layers = self.layers.len(), "关闭分层上下文");
        let mut first_error = None;
        let containers = std::iter::once(&self.root).chain(self.layers.iter().map(|layer| &layer.container));
        for container in containers {
            if let Err(error) = container.close() {
                warn!(container = %container.container_id(), %error, "关闭层容器失败");
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn foreign(&self, from: Option<ContainerId>) -> impl Iterator<Item = &Layer> + '_ {
        self.layers
            .iter()
            .filter(move |layer| Some(layer.container.container_id()) != from)
    }

    /// 根层开放、请求不来自根层、且没有子层占有时可以由根层创建
    fn creatable(&self, from: Option<ContainerId>, claimed: impl Fn(&dyn Layerable) -> bool) -> bool {
        self.open
            && from != Some(self.root.container_id())
            && !self
                .layers
                .iter()
                .any(|layer| claimed(layer.container.as_ref()))
    }

    fn missing_as_none(
        result: DependencyResult<Instance>,
        key: &TypeKey,
    ) -> DependencyResult<Option<Instance>> {
        match result {
            Ok(instance) => Ok(Some(instance)),
            Err(DependencyError::ComponentNotRegistered { type_name }) if type_name == key.name => {
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    fn lookup_type(&self, key: &TypeKey, from: Option<ContainerId>) -> DependencyResult<Option<Instance>> {
        if let Some(layer) = self.foreign(from).find(|layer| layer.exports.exports_type(key)) {
            debug!(component = key.name, layer = %layer.container.container_id(), "委托给导出层");
            return layer.container.get_by_type(key).map(Some);
        }
        if self.creatable(from, |container| container.contains_type(key)) {
            debug!(component = key.name, "由根层创建");
            return Self::missing_as_none(self.root.get_by_type(key), key);
        }
        Ok(None)
    }

    fn lookup_name(&self, name: &str, from: Option<ContainerId>) -> DependencyResult<Option<Instance>> {
        if let Some(layer) = self.foreign(from).find(|layer| layer.exports.exports_name(name)) {
            debug!(name, layer = %layer.container.container_id(), "委托给导出层");
            return layer.container.get_by_name(name);
        }
        if self.creatable(from, |container| container.contains_name(name)) {
            return self.root.get_by_name(name);
        }
        Ok(None)
    }

    fn lookup_supertype(&self, key: &TypeKey, from: Option<ContainerId>) -> DependencyResult<Vec<ComponentRef>> {
        let mut members = Vec::new();
        for layer in self.foreign(from) {
            if layer.exports.exports_supertype(key) {
                members.extend(layer.container.get_members_by_supertype(key)?);
            }
        }
        if members.is_empty() && self.creatable(from, |container| container.contains_supertype(key)) {
            members = self.root.get_members_by_supertype(key)?;
        }
        Ok(members)
    }

    fn lookup_factory(&self, key: &TypeKey, from: Option<ContainerId>) -> DependencyResult<Option<Instance>> {
        if let Some(layer) = self.foreign(from).find(|layer| layer.exports.exports_factory(key)) {
            return layer.container.get_factory(key).map(Some);
        }
        if self.creatable(from, |container| container.contains_type(key)) {
            return Self::missing_as_none(self.root.get_factory(key), key);
        }
        Ok(None)
    }

    fn lookup_interceptor(&self, key: &TypeKey, from: Option<ContainerId>) -> DependencyResult<Option<Instance>> {
        if let Some(layer) = self.foreign(from).find(|layer| layer.exports.exports_interceptor(key)) {
            return layer.container.get_interceptor(key).map(Some);
        }
        if self.creatable(from, |container| container.contains_type(key)) {
            return Self::missing_as_none(self.root.get_interceptor(key), key);
        }
        Ok(None)
    }
}

impl LayerImport for LayerContext {
    fn import_by_type(&self, key: &TypeKey, from: ContainerId) -> DependencyResult<Option<Instance>> {
        self.lookup_type(key, Some(from))
    }

    fn import_by_name(&self, name: &str, from: ContainerId) -> DependencyResult<Option<Instance>> {
        self.lookup_name(name, Some(from))
    }

    fn import_by_supertype(&self, key: &TypeKey, from: ContainerId) -> DependencyResult<Vec<ComponentRef>> {
        self.lookup_supertype(key, Some(from))
    }

    fn import_factory(&self, key: &TypeKey, from: ContainerId) -> DependencyResult<Option<Instance>> {
        self.lookup_factory(key, Some(from))
    }

    fn import_interceptor(&self, key: &TypeKey, from: ContainerId) -> DependencyResult<Option<Instance>> {
        self.lookup_interceptor(key, Some(from))
    }
}

impl DependencyContext for LayerContext {
    fn get_by_type(&self, key: &TypeKey) -> DependencyResult<Instance> {
        self.find_by_type(key)?
            .ok_or_else(|| DependencyError::not_registered(key.name))
    }

    fn get_by_name(&self, name: &str) -> DependencyResult<Option<Instance>> {
        self.find_by_name(name)
    }

    fn get_by_supertype(&self, key: &TypeKey) -> DependencyResult<Vec<Instance>> {
        Ok(self
            .find_by_supertype(key)?
            .into_iter()
            .map(|member| member.instance)
            .collect())
    }

    /// 根层的存活组件加上各子层导出类型的存活组件
    fn get_all_components(&self) -> DependencyResult<Vec<Instance>> {
        let mut components = if self.open {
            self.root.get_all_components()?
        } else {
            Vec::new()
        };
        for layer in &self.layers {
            components.extend(
                layer
                    .container
                    .live_components()?
                    .into_iter()
                    .filter(|(entry, _)| layer.exports.exports_type(&entry.type_key))
                    .map(|(_, instance)| instance),
            );
        }
        Ok(components)
    }
}

impl FactoryContext for LayerContext {
    fn get_factory(&self, key: &TypeKey) -> DependencyResult<Instance> {
        self.lookup_factory(key, None)?
            .ok_or_else(|| DependencyError::not_registered(key.name))
    }

    fn get_interceptor(&self, key: &TypeKey) -> DependencyResult<Instance> {
        self.lookup_interceptor(key, None)?
            .ok_or_else(|| DependencyError::not_registered(key.name))
    }
}

/// 分层上下文构建器
pub struct LayerContextBuilder {
    root: Arc<dyn Layerable>,
    open: bool,
    layers: Vec<Arc<dyn Layerable>>,
}

impl LayerContextBuilder {
    /// 创建构建器，根层默认开放
    pub fn new(root: Arc<dyn Layerable>) -> Self {
        Self {
            root,
            open: true,
            layers: Vec::new(),
        }
    }

    /// 根层只委托、不创建
    pub fn closed(mut self) -> Self {
        self.open = false;
        self
    }

    /// 设置根层是否开放
    pub fn with_open(mut self, open: bool) -> Self {
        self.open = open;
        self
    }

    /// 添加子层
    pub fn with_layer(mut self, layer: Arc<dyn Layerable>) -> Self {
        self.layers.push(layer);
        self
    }

    /// 构建上下文，计算各子层的导出快照并把上下文挂到每个容器上
    pub fn build(self) -> DependencyResult<Arc<LayerContext>> {
        let root_id = self.root.container_id();
        let mut layers = Vec::with_capacity(self.layers.len());
        for container in self.layers {
            let id = container.container_id();
            if id == root_id || layers.iter().any(|layer: &Layer| layer.container.container_id() == id) {
                return Err(DependencyError::configuration(format!(
                    "容器 {id} 重复加入分层上下文"
                )));
            }
            let exports = ExportSet::from_descriptors(&container.exports());
            debug!(layer = %id, exports = exports.len(), "加入子层");
            layers.push(Layer { container, exports });
        }

        let context = Arc::new(LayerContext {
            root: self.root,
            open: self.open,
            layers,
        });
        let import: Weak<dyn LayerImport> = Arc::downgrade(&context) as Weak<dyn LayerImport>;
        context.root.set_import(import.clone())?;
        for layer in &context.layers {
            layer.container.set_import(import.clone())?;
        }

        info!(
            root = %root_id,
            open = context.open,
            layers = context.layers.len(),
            "分层上下文构建完成"
        );
        Ok(context)
    }
}
