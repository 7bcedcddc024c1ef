//! Virtual DOM Patcher
//!
//! Applies a new vnode tree onto the DOM produced by an older one, calling
//! [`Module`] hooks along the way. Two vnodes are the "same" when their
//! selector and key agree; same vnodes are patched in place, others are
//! replaced.
//!
//! No borrow of the document is held while a hook runs.

use std::rc::Rc;

use fos_dom::{DomTree, NodeData, NodeId, SharedDocument};

use crate::config::ErrorReporter;
use crate::vnode::{ParsedSelector, VNode};
use crate::{DriverError, Result};

/// Patch lifecycle hooks
///
/// Hook failures are reported through the driver's error reporter and never
/// abort the patch.
pub trait Module {
    /// Name used in error reports
    fn name(&self) -> &str {
        "module"
    }

    /// Before a patch starts
    fn pre(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// An element was created for `vnode` (children already created)
    fn create(&self, _vnode: &VNode) -> anyhow::Result<()> {
        Ok(())
    }

    /// `old` was patched into `vnode`
    fn update(&self, _old: &VNode, _vnode: &VNode) -> anyhow::Result<()> {
        Ok(())
    }

    /// `vnode` is about to be removed, called for the whole removed subtree
    fn destroy(&self, _vnode: &VNode) -> anyhow::Result<()> {
        Ok(())
    }

    /// `vnode` is about to be detached, called for the top of the removed
    /// subtree only
    fn remove(&self, _vnode: &VNode) -> anyhow::Result<()> {
        Ok(())
    }

    /// The patch is complete
    fn post(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// True if `a` and `b` describe the same DOM node
pub fn same_vnode(a: &VNode, b: &VNode) -> bool {
    a.sel == b.sel && a.key == b.key
}

/// Patches vnode trees into a shared document
pub struct Patcher {
    doc: SharedDocument,
    modules: Vec<Rc<dyn Module>>,
    report: ErrorReporter,
}

impl Patcher {
    pub fn new(doc: SharedDocument, modules: Vec<Rc<dyn Module>>, report: ErrorReporter) -> Self {
        Self {
            doc,
            modules,
            report,
        }
    }

    /// Patch `old` (which must have been patched or built with [`to_vnode`])
    /// into `new`, returning `new` with every `elm` filled in
    pub fn patch(&self, old: &VNode, new: VNode) -> Result<VNode> {
        self.run_hook("pre", |m| m.pre());

        let result = self.patch_root(old, new);

        self.run_hook("post", |m| m.post());
        result
    }

    fn patch_root(&self, old: &VNode, new: VNode) -> Result<VNode> {
        if same_vnode(old, &new) && old.elm.is_some() {
            return self.patch_vnode(old, new);
        }

        let created = self.create_elm(new)?;
        if let (Some(old_elm), Some(new_elm)) = (old.elm, created.elm) {
            let parent = self.doc.borrow().tree.parent(old_elm);
            if let Some(parent) = parent {
                self.doc
                    .borrow_mut()
                    .tree
                    .insert_before(parent, new_elm, Some(old_elm))?;
            }
        }
        self.remove_vnodes(&[old]);
        Ok(created)
    }

    fn create_elm(&self, mut vnode: VNode) -> Result<VNode> {
        let Some(selector) = vnode.selector() else {
            let text = vnode.text.as_deref().unwrap_or_default();
            vnode.elm = Some(self.doc.borrow_mut().tree.create_text(text));
            return Ok(vnode);
        };

        let elm = {
            let mut doc = self.doc.borrow_mut();
            let elm = doc.tree.create_element(&selector.tag);
            if let Some(data) = doc.tree.element_mut(elm) {
                for (name, value) in vnode.attributes() {
                    data.set_attr(&name, &value);
                }
            }
            elm
        };
        vnode.elm = Some(elm);

        let children = std::mem::take(&mut vnode.children);
        for child in children {
            let child = self.create_elm(child)?;
            if let Some(child_elm) = child.elm {
                self.doc.borrow_mut().tree.append_child(elm, child_elm)?;
            }
            vnode.children.push(child);
        }

        self.run_hook("create", |m| m.create(&vnode));
        Ok(vnode)
    }

    fn patch_vnode(&self, old: &VNode, mut new: VNode) -> Result<VNode> {
        let Some(elm) = old.elm else {
            return self.create_elm(new);
        };
        new.elm = Some(elm);

        if new.is_text() {
            if old.text != new.text {
                let text = new.text.as_deref().unwrap_or_default();
                self.doc.borrow_mut().tree.set_text(elm, text);
            }
            return Ok(new);
        }

        self.update_attributes(elm, old, &new);
        self.run_hook("update", |m| m.update(old, &new));

        let children = std::mem::take(&mut new.children);
        new.children = self.update_children(elm, &old.children, children)?;
        Ok(new)
    }

    fn update_attributes(&self, elm: NodeId, old: &VNode, new: &VNode) {
        let before = old.attributes();
        let after = new.attributes();
        if before == after {
            return;
        }

        let mut doc = self.doc.borrow_mut();
        let Some(data) = doc.tree.element_mut(elm) else {
            return;
        };
        for name in before.keys().filter(|name| !after.contains_key(*name)) {
            data.remove_attr(name);
        }
        for (name, value) in &after {
            if before.get(name) != Some(value) {
                data.set_attr(name, value);
            }
        }
    }

    fn update_children(
        &self,
        parent: NodeId,
        old_children: &[VNode],
        new_children: Vec<VNode>,
    ) -> Result<Vec<VNode>> {
        let mut used = vec![false; old_children.len()];
        let mut patched = Vec::with_capacity(new_children.len());

        for child in new_children {
            let reuse = old_children
                .iter()
                .enumerate()
                .position(|(i, old)| !used[i] && old.elm.is_some() && same_vnode(old, &child));
            let child = match reuse {
                Some(i) => {
                    used[i] = true;
                    self.patch_vnode(&old_children[i], child)?
                }
                None => self.create_elm(child)?,
            };
            patched.push(child);
        }

        let leftovers: Vec<&VNode> = old_children
            .iter()
            .zip(&used)
            .filter(|(_, used)| !**used)
            .map(|(old, _)| old)
            .collect();
        self.remove_vnodes(&leftovers);

        let mut doc = self.doc.borrow_mut();
        for child in &patched {
            if let Some(elm) = child.elm {
                doc.tree.append_child(parent, elm)?;
            }
        }
        Ok(patched)
    }

    fn remove_vnodes(&self, vnodes: &[&VNode]) {
        for vnode in vnodes {
            self.invoke_destroy(vnode);
            if !vnode.is_text() {
                self.run_hook("remove", |m| m.remove(vnode));
            }
            if let Some(elm) = vnode.elm {
                self.doc.borrow_mut().tree.detach(elm);
            }
        }
    }

    fn invoke_destroy(&self, vnode: &VNode) {
        if vnode.is_text() {
            return;
        }
        self.run_hook("destroy", |m| m.destroy(vnode));
        for child in &vnode.children {
            self.invoke_destroy(child);
        }
    }

    fn run_hook(&self, hook: &'static str, call: impl Fn(&dyn Module) -> anyhow::Result<()>) {
        for module in &self.modules {
            if let Err(source) = call(module.as_ref()) {
                (self.report)(&DriverError::ModuleHook {
                    module: module.name().to_string(),
                    hook,
                    source,
                });
            }
        }
    }
}

/// Describe an existing DOM node as a vnode. Comments are skipped.
pub fn to_vnode(tree: &DomTree, node: NodeId) -> VNode {
    let Some(data) = tree.get(node).map(|n| &n.data) else {
        return VNode::default();
    };

    let mut vnode = match data {
        NodeData::Text(text) => VNode::text(text),
        NodeData::Element(element) => {
            let sel = ParsedSelector {
                tag: element.tag.clone(),
                id: element.id.clone(),
                classes: element.classes.clone(),
            }
            .to_sel();
            let mut vnode = VNode::element(&sel);
            for attr in &element.attrs {
                vnode.data.attrs.insert(attr.name.clone(), attr.value.clone());
            }
            vnode.children = tree
                .children(node)
                .iter()
                .filter(|&&c| !matches!(tree.get(c).map(|n| &n.data), Some(NodeData::Comment(_))))
                .map(|&c| to_vnode(tree, c))
                .collect();
            vnode
        }
        NodeData::Document | NodeData::Comment(_) => VNode::default(),
    };
    vnode.elm = Some(node);
    vnode
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vnode::h;
    use fos_dom::Document;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        log: RefCell<Vec<String>>,
    }

    impl Module for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn create(&self, vnode: &VNode) -> anyhow::Result<()> {
            self.log.borrow_mut().push(format!("create {}", vnode.sel.as_deref().unwrap_or("")));
            Ok(())
        }

        fn destroy(&self, vnode: &VNode) -> anyhow::Result<()> {
            self.log.borrow_mut().push(format!("destroy {}", vnode.sel.as_deref().unwrap_or("")));
            Ok(())
        }

        fn remove(&self, vnode: &VNode) -> anyhow::Result<()> {
            self.log.borrow_mut().push(format!("remove {}", vnode.sel.as_deref().unwrap_or("")));
            Ok(())
        }

        fn post(&self) -> anyhow::Result<()> {
            anyhow::bail!("post always fails")
        }
    }

    fn setup() -> (SharedDocument, NodeId, Rc<Recorder>, Rc<RefCell<Vec<String>>>) {
        let doc = Document::shared("about:blank");
        let app = {
            let mut d = doc.borrow_mut();
            let body = d.body();
            let app = d.append_element(body, "div");
            d.tree.element_mut(app).unwrap().set_attr("id", "app");
            app
        };
        (doc, app, Rc::new(Recorder::default()), Rc::new(RefCell::new(Vec::new())))
    }

    fn patcher(doc: &SharedDocument, recorder: &Rc<Recorder>, errors: &Rc<RefCell<Vec<String>>>) -> Patcher {
        let errors = errors.clone();
        Patcher::new(
            doc.clone(),
            vec![recorder.clone() as Rc<dyn Module>],
            Rc::new(move |e: &DriverError| errors.borrow_mut().push(e.to_string())),
        )
    }

    #[test]
    fn test_patch_creates_children() {
        let (doc, app, recorder, errors) = setup();
        let patcher = patcher(&doc, &recorder, &errors);
        let old = to_vnode(&doc.borrow().tree, app);

        let new = h("div#app", vec![h("ul.list", vec![VNode::element("li").with_text("one")])]);
        let patched = patcher.patch(&old, new).unwrap();

        assert_eq!(patched.elm, Some(app));
        let d = doc.borrow();
        let ul = d.tree.children(app)[0];
        assert_eq!(d.tree.tag(ul), Some("ul"));
        assert_eq!(d.tree.text_content(app), "one");
        assert_eq!(*recorder.log.borrow(), vec!["create li", "create ul.list"]);
        assert_eq!(errors.borrow().len(), 1);
        assert!(errors.borrow()[0].contains("recorder"));
    }

    #[test]
    fn test_patch_reuses_and_removes() {
        let (doc, app, recorder, errors) = setup();
        let patcher = patcher(&doc, &recorder, &errors);
        let old = to_vnode(&doc.borrow().tree, app);

        let first = patcher
            .patch(&old, h("div#app", vec![h("p.a", vec![]), h("p.b", vec![h("span", vec![])])]))
            .unwrap();
        let kept = first.children[0].elm;
        recorder.log.borrow_mut().clear();

        let second = patcher
            .patch(&first, h("div#app", vec![h("p.a", vec![]).with_class("on", true)]))
            .unwrap();

        assert_eq!(second.children[0].elm, kept);
        assert_eq!(*recorder.log.borrow(), vec!["destroy p.b", "destroy span", "remove p.b"]);
        let d = doc.borrow();
        assert_eq!(d.tree.children(app).len(), 1);
        assert!(d.tree.element(kept.unwrap()).unwrap().has_class("on"));
    }

    #[test]
    fn test_patch_replaces_different_root() {
        let (doc, app, recorder, errors) = setup();
        let patcher = patcher(&doc, &recorder, &errors);
        let old = to_vnode(&doc.borrow().tree, app);

        let patched = patcher.patch(&old, h("section", vec![])).unwrap();
        let section = patched.elm.unwrap();

        let d = doc.borrow();
        assert_eq!(d.tree.parent(section), Some(d.body()));
        assert_eq!(d.tree.parent(app), None);
    }

    #[test]
    fn test_text_update() {
        let (doc, app, recorder, errors) = setup();
        let patcher = patcher(&doc, &recorder, &errors);
        let old = to_vnode(&doc.borrow().tree, app);

        let first = patcher.patch(&old, h("div#app", vec![VNode::text("a")])).unwrap();
        let text = first.children[0].elm;
        let second = patcher.patch(&first, h("div#app", vec![VNode::text("b")])).unwrap();

        assert_eq!(second.children[0].elm, text);
        assert_eq!(doc.borrow().tree.text_content(app), "b");
    }

    #[test]
    fn test_to_vnode_reads_attributes() {
        let (doc, app, _, _) = setup();
        {
            let mut d = doc.borrow_mut();
            let data = d.tree.element_mut(app).unwrap();
            data.set_attr("class", "main wide");
            data.set_attr("role", "main");
        }
        let vnode = to_vnode(&doc.borrow().tree, app);
        assert_eq!(vnode.sel.as_deref(), Some("div#app.main.wide"));
        assert_eq!(vnode.data.attrs.get("role").map(String::as_str), Some("main"));
        assert_eq!(vnode.elm, Some(app));
    }
}
