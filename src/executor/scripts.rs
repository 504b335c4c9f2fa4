//! Page-side interpreter for setup operations and their undo records

use serde::Serialize;

use crate::executor::ops::{SetupOp, Target};
use crate::executor::transaction::UndoRecord;

const APPLY_TEMPLATE: &str = r#"(function() {
    function lcElementAt(path) {
        let el = document.documentElement;
        for (const step of path) {
            if (!el || !el.children[step]) return null;
            el = el.children[step];
        }
        return el;
    }
    const SKIPPED = ['script', 'style', 'noscript', 'template', 'head', 'meta', 'link', 'title', 'base'];
    const STRIP = [['background-color', 'transparent'], ['background-image', 'none'],
        ['border-top-color', 'transparent'], ['border-right-color', 'transparent'],
        ['border-bottom-color', 'transparent'], ['border-left-color', 'transparent'],
        ['box-shadow', 'none'], ['filter', 'none'], ['outline-color', 'transparent']];
    const txn = {{TXN}};
    const ops = {{OPS}};
    const measure = {{MEASURE}};
    const registry = (window.__lcTxn = window.__lcTxn || {});
    const state = registry[txn] = { elements: [], records: [] };
    const markers = {};
    const snapshots = new Set();

    function ref(el) {
        let i = state.elements.indexOf(el);
        if (i < 0) { state.elements.push(el); i = state.elements.length - 1; }
        return i;
    }
    function resolve(target) {
        if (target.path) return lcElementAt(target.path);
        if (target.marker) return markers[target.marker] || null;
        return null;
    }
    function setStyle(el, property, value, important) {
        // The verbatim style attribute is restored last, after the per-property records
        if (!snapshots.has(el)) {
            snapshots.add(el);
            state.records.push({
                kind: 'attribute', element: ref(el), name: 'style',
                previous: el.hasAttribute('style') ? el.getAttribute('style') : null
            });
        }
        state.records.push({
            kind: 'style', element: ref(el), property: property,
            previous: el.style.getPropertyValue(property),
            priority: el.style.getPropertyPriority(property)
        });
        el.style.setProperty(property, value, important ? 'important' : '');
    }
    function setAttr(el, name, value) {
        state.records.push({
            kind: 'attribute', element: ref(el), name: name,
            previous: el.hasAttribute(name) ? el.getAttribute(name) : null
        });
        el.setAttribute(name, value);
    }

    const handlers = {
        scrollTo: function(op) {
            state.records.push({ kind: 'scroll', x: window.scrollX, y: window.scrollY });
            window.scrollTo(op.x, op.y);
        },
        setStyle: function(op) {
            const el = resolve(op.target);
            if (!el) return false;
            setStyle(el, op.property, op.value, op.important);
        },
        setAttribute: function(op) {
            const el = resolve(op.target);
            if (!el) return false;
            setAttr(el, op.name, op.value);
        },
        isolate: function(op) {
            const roots = [];
            const chain = new Set();
            for (const t of op.targets) {
                const el = resolve(t);
                if (!el || !el.isConnected) return false;
                roots.push(el);
                for (let a = el; a; a = a.parentElement) chain.add(a);
            }
            for (const el of chain) {
                if (roots.indexOf(el) >= 0) continue;
                for (const child of Array.from(el.children)) {
                    if (chain.has(child) || SKIPPED.indexOf(child.tagName.toLowerCase()) >= 0) continue;
                    setStyle(child, 'opacity', '0', true);
                }
            }
        },
        hideChildren: function(op) {
            const el = resolve(op.target);
            if (!el) return false;
            for (const child of Array.from(el.children)) setStyle(child, 'opacity', '0', true);
        },
        hideOwnText: function(op) {
            const el = resolve(op.target);
            if (!el) return false;
            for (const node of Array.from(el.childNodes)) {
                if (node.nodeType !== 3 || !node.textContent.trim()) continue;
                const span = document.createElement('span');
                span.style.setProperty(op.preserveGeometry ? 'visibility' : 'display',
                    op.preserveGeometry ? 'hidden' : 'none', 'important');
                el.insertBefore(span, node);
                span.appendChild(node);
                state.records.push({ kind: 'unwrap', element: ref(span) });
            }
        },
        stripAncestorPaint: function(op) {
            const el = resolve(op.target);
            if (!el) return false;
            for (let a = el.parentElement; a; a = a.parentElement) {
                for (const entry of STRIP) setStyle(a, entry[0], entry[1], true);
            }
        },
        cloneToCorner: function(op) {
            const source = resolve(op.source);
            if (!source || !source.isConnected) return false;
            const rect = source.getBoundingClientRect();
            const clone = source.cloneNode(true);
            const from = [source].concat(Array.from(source.querySelectorAll('*')));
            const to = [clone].concat(Array.from(clone.querySelectorAll('*')));
            for (let i = 0; i < from.length && i < to.length; i++) {
                const cs = getComputedStyle(from[i]);
                for (const p of op.copy) to[i].style.setProperty(p, cs.getPropertyValue(p));
            }
            const s = clone.style;
            s.setProperty('position', 'fixed', 'important');
            s.setProperty('left', op.offset + 'px', 'important');
            s.setProperty('top', op.offset + 'px', 'important');
            s.setProperty('right', 'auto', 'important');
            s.setProperty('bottom', 'auto', 'important');
            s.setProperty('margin', '0', 'important');
            s.setProperty('width', rect.width + 'px', 'important');
            s.setProperty('height', rect.height + 'px', 'important');
            s.setProperty('box-sizing', 'border-box', 'important');
            s.setProperty('z-index', '2147483647', 'important');
            if (op.neutralizeTransform) s.setProperty('transform', 'none', 'important');
            if (op.opacity !== null) s.setProperty('opacity', String(op.opacity), 'important');
            clone.setAttribute('data-lc-clone', op.marker);
            document.body.appendChild(clone);
            markers[op.marker] = clone;
            state.records.push({ kind: 'removeNode', element: ref(clone) });
        },
        injectStyleSheet: function(op) {
            const sheet = document.createElement('style');
            sheet.id = op.id;
            sheet.textContent = op.css;
            (document.head || document.documentElement).appendChild(sheet);
            state.records.push({ kind: 'removeNode', element: ref(sheet) });
        }
    };

    try {
        for (const op of ops) {
            const handler = handlers[op.op];
            if (!handler) throw new Error('unknown setup op ' + op.op);
            if (handler(op) === false) {
                return JSON.stringify({ ok: true, vanished: true, rect: null, undo: state.records });
            }
        }
        const target = resolve(measure);
        if (!target || !target.isConnected) {
            return JSON.stringify({ ok: true, vanished: true, rect: null, undo: state.records });
        }
        const r = target.getBoundingClientRect();
        const rect = { x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height };
        const vanished = !(rect.width > 0 && rect.height > 0);
        return JSON.stringify({ ok: true, vanished: vanished, rect: vanished ? null : rect, undo: state.records });
    } catch (e) {
        return JSON.stringify({ ok: false, error: String((e && e.message) || e), undo: state.records });
    }
})()"#;

const REVERT_TEMPLATE: &str = r#"(function() {
    const txn = {{TXN}};
    const provided = {{RECORDS}};
    const registry = window.__lcTxn || {};
    const state = registry[txn];
    const elements = state ? state.elements : [];
    const records = provided !== null ? provided : (state ? state.records.slice().reverse() : []);
    const failures = [];
    for (const rec of records) {
        try {
            const el = rec.element === undefined ? null : elements[rec.element];
            if (rec.kind !== 'scroll' && !el) throw new Error('element ' + rec.element + ' is gone');
            switch (rec.kind) {
                case 'style':
                    if (rec.previous) el.style.setProperty(rec.property, rec.previous, rec.priority);
                    else el.style.removeProperty(rec.property);
                    if (el.getAttribute('style') === '') el.removeAttribute('style');
                    break;
                case 'attribute':
                    if (rec.previous === null) el.removeAttribute(rec.name);
                    else el.setAttribute(rec.name, rec.previous);
                    break;
                case 'removeNode':
                    el.remove();
                    break;
                case 'unwrap':
                    while (el.firstChild) el.parentNode.insertBefore(el.firstChild, el);
                    el.remove();
                    break;
                case 'scroll':
                    window.scrollTo(rec.x, rec.y);
                    break;
                default:
                    throw new Error('unknown undo record ' + rec.kind);
            }
        } catch (e) {
            failures.push(rec.kind + ': ' + String((e && e.message) || e));
        }
    }
    delete registry[txn];
    return JSON.stringify({ reverted: records.length, failures: failures });
})()"#;

fn json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

pub fn apply(txn: &str, ops: &[SetupOp], measure: &Target) -> String {
    APPLY_TEMPLATE
        .replace("{{TXN}}", &json(txn))
        .replace("{{OPS}}", &json(ops))
        .replace("{{MEASURE}}", &json(measure))
}

/// `records` are in revert order; `None` lets the page fall back to its own log
pub fn revert(txn: &str, records: Option<&[UndoRecord]>) -> String {
    REVERT_TEMPLATE
        .replace("{{TXN}}", &json(txn))
        .replace("{{RECORDS}}", &json(&records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DomPath;

    #[test]
    fn ancestor_paint_is_stripped_through_longhands() {
        let script = apply("lc-txn-0", &[], &Target::path(&DomPath(vec![1])));
        let strip = script
            .lines()
            .skip_while(|line| !line.contains("const STRIP"))
            .take_while(|line| !line.contains("const txn"))
            .collect::<String>();
        for shorthand in ["'background'", "'border-color'"] {
            assert!(!strip.contains(shorthand), "{} in {}", shorthand, strip);
        }
        assert!(strip.contains("'background-color'"));
        assert!(strip.contains("'border-left-color'"));
    }

    #[test]
    fn style_attribute_is_snapshotted_before_the_first_change() {
        let script = apply("lc-txn-0", &[], &Target::path(&DomPath(vec![1])));
        let snapshot = script.find("name: 'style'").unwrap();
        let first_change = script.find("kind: 'style'").unwrap();
        assert!(snapshot < first_change);
    }

    #[test]
    fn revert_embeds_records_or_null() {
        assert!(revert("lc-txn-3", None).contains("const provided = null;"));
        let records = [UndoRecord::Scroll { x: 0.0, y: 12.0 }];
        let script = revert("lc-txn-3", Some(&records));
        assert!(script.contains("const txn = \"lc-txn-3\";"));
        assert!(script.contains("\"kind\":\"scroll\""));
    }
}
