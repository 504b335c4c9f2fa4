//! Page-side scripts used by the analyzer
//!
//! Every script returns a JSON string so the session can hand back plain
//! `serde_json::Value`s. Templates are filled with `{{TOKEN}}` substitution,
//! the substituted values are always JSON literals.

use crate::model::DomPath;

/// Path helpers shared by every analyzer script
const HELPERS: &str = r#"
    function lcPathOf(el) {
        const steps = [];
        while (el && el !== document.documentElement) {
            const parent = el.parentElement;
            if (!parent) return null;
            steps.unshift(Array.prototype.indexOf.call(parent.children, el));
            el = parent;
        }
        return steps;
    }
    function lcElementAt(path) {
        let el = document.documentElement;
        for (const step of path) {
            if (!el || !el.children[step]) return null;
            el = el.children[step];
        }
        return el;
    }
    function lcRect(el) {
        const r = el.getBoundingClientRect();
        return { x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height };
    }
    function lcIdentity(el) {
        const cls = typeof el.className === 'string' ? el.className : (el.getAttribute('class') || '');
        return [el.tagName.toLowerCase(), el.id || '', cls, el.getAttribute('role') || ''].join(' ').toLowerCase();
    }
    const LC_SKIPPED = ['script', 'style', 'noscript', 'template', 'head', 'meta', 'link', 'title', 'base'];
"#;

const STABILITY_TEMPLATE: &str = r#"(async function() {
    const fontsReady = (document.fonts && document.fonts.ready)
        ? document.fonts.ready.then(function() { return true; })
        : Promise.resolve(true);
    const timedOut = new Promise(function(resolve) { setTimeout(function() { resolve(false); }, {{FONT_WAIT_MS}}); });
    const fontsLoaded = await Promise.race([fontsReady, timedOut]);
    await new Promise(function(resolve) {
        requestAnimationFrame(function() { requestAnimationFrame(resolve); });
    });
    await new Promise(function(resolve) { setTimeout(resolve, {{SETTLE_MS}}); });
    return JSON.stringify({ fontsLoaded: fontsLoaded });
})()"#;

const PROBE_TEMPLATE: &str = r#"(function() {
    {{HELPERS}}
    window.scrollTo(0, 0);
    const selector = {{ROOT_SELECTOR}};
    let explicitRoot = null;
    if (selector !== null) {
        let found = null;
        try { found = document.querySelector(selector); } catch (e) { found = null; }
        explicitRoot = { found: !!found, path: found ? lcPathOf(found) : null };
    }
    const elements = [];
    const body = document.body;
    const stack = body ? [[body, 0]] : [];
    while (stack.length) {
        const entry = stack.pop();
        const el = entry[0];
        const depth = entry[1];
        if (LC_SKIPPED.indexOf(el.tagName.toLowerCase()) >= 0) continue;
        const cs = getComputedStyle(el);
        if (cs.display === 'none' || parseFloat(cs.opacity) === 0) continue;
        const rect = lcRect(el);
        const kids = Array.from(el.children);
        const visibleChildCount = kids.filter(function(k) {
            const kcs = getComputedStyle(k);
            const kr = k.getBoundingClientRect();
            return kcs.display !== 'none' && kcs.visibility !== 'hidden' && kr.width > 0 && kr.height > 0;
        }).length;
        if (cs.visibility !== 'hidden' && rect.width > 0 && rect.height > 0) {
            const parent = el.parentElement;
            elements.push({
                path: lcPathOf(el),
                depth: depth,
                identity: lcIdentity(el),
                rect: rect,
                position: cs.position,
                zIndex: cs.zIndex === 'auto' ? 0 : (parseInt(cs.zIndex, 10) || 0),
                backgroundColor: cs.backgroundColor,
                backgroundImage: cs.backgroundImage,
                childCount: kids.length,
                visibleChildCount: visibleChildCount,
                insets: {
                    top: isNaN(parseFloat(cs.top)) ? null : parseFloat(cs.top),
                    right: isNaN(parseFloat(cs.right)) ? null : parseFloat(cs.right),
                    bottom: isNaN(parseFloat(cs.bottom)) ? null : parseFloat(cs.bottom),
                    left: isNaN(parseFloat(cs.left)) ? null : parseFloat(cs.left)
                },
                parentRect: parent ? lcRect(parent) : null
            });
        }
        for (let i = kids.length - 1; i >= 0; i--) stack.push([kids[i], depth + 1]);
    }
    return JSON.stringify({
        viewport: {
            width: window.innerWidth,
            height: window.innerHeight,
            pixelRatio: window.devicePixelRatio || 1,
            scrollX: window.scrollX,
            scrollY: window.scrollY
        },
        bodyPath: body ? lcPathOf(body) : null,
        explicitRoot: explicitRoot,
        elements: elements
    });
})()"#;

const SNAPSHOT_TEMPLATE: &str = r#"(function() {
    {{HELPERS}}
    const ATOMIC = {{ATOMIC_TAGS}};
    const PROPS = {{STYLE_PROPS}};
    const rootEl = lcElementAt({{ROOT_PATH}});
    if (!rootEl) return JSON.stringify(null);
    const maskPath = {{MASK_PATH}};
    const maskEl = maskPath === null ? null : lcElementAt(maskPath);

    function styleOf(el) {
        const cs = getComputedStyle(el);
        const out = {};
        for (const prop of PROPS) out[prop] = cs.getPropertyValue(prop);
        return out;
    }
    function attrsOf(el) {
        const out = {};
        for (const name of ['id', 'class', 'type', 'alt', 'href', 'aria-label', 'tabindex', 'role', 'contenteditable']) {
            if (el.hasAttribute(name)) out[name] = el.getAttribute(name);
        }
        if (el.hasAttribute('onclick')) out['onclick'] = '';
        if (el.tagName === 'IMG' && (el.currentSrc || el.src)) out['src'] = el.currentSrc || el.src;
        return out;
    }
    function ownText(el) {
        const runs = Array.from(el.childNodes).filter(function(n) {
            return n.nodeType === 3 && n.textContent.trim().length > 0;
        });
        if (!runs.length) return null;
        let box = null;
        for (const run of runs) {
            const range = document.createRange();
            range.selectNodeContents(run);
            for (const r of Array.from(range.getClientRects())) {
                if (r.width <= 0 || r.height <= 0) continue;
                const x0 = r.left + window.scrollX, y0 = r.top + window.scrollY;
                if (!box) { box = { x0: x0, y0: y0, x1: x0 + r.width, y1: y0 + r.height }; continue; }
                box.x0 = Math.min(box.x0, x0); box.y0 = Math.min(box.y0, y0);
                box.x1 = Math.max(box.x1, x0 + r.width); box.y1 = Math.max(box.y1, y0 + r.height);
            }
        }
        const text = runs.map(function(n) { return n.textContent; }).join(' ').replace(/\s+/g, ' ').trim();
        return {
            text: text,
            rect: box ? { x: box.x0, y: box.y0, width: box.x1 - box.x0, height: box.y1 - box.y0 } : null
        };
    }
    function occlusion(el, rect) {
        if (!maskEl || maskEl === el || maskEl.contains(el) || el.contains(maskEl)) return [];
        const vx = rect.x - window.scrollX, vy = rect.y - window.scrollY;
        const points = [
            [vx + rect.width / 2, vy + rect.height / 2],
            [vx + rect.width * 0.1, vy + rect.height * 0.1],
            [vx + rect.width * 0.9, vy + rect.height * 0.1],
            [vx + rect.width * 0.1, vy + rect.height * 0.9],
            [vx + rect.width * 0.9, vy + rect.height * 0.9]
        ];
        const samples = [];
        for (const p of points) {
            if (p[0] < 0 || p[1] < 0 || p[0] >= window.innerWidth || p[1] >= window.innerHeight) continue;
            const hit = document.elementFromPoint(p[0], p[1]);
            samples.push({
                hitMask: !!hit && (hit === maskEl || maskEl.contains(hit)),
                hitMaskRoot: hit === maskEl
            });
        }
        return samples;
    }
    function describe(el, isMask) {
        const cs = getComputedStyle(el);
        if (cs.display === 'none' || parseFloat(cs.opacity) === 0) return null;
        const tag = el.tagName.toLowerCase();
        const rect = lcRect(el);
        const node = {
            path: lcPathOf(el),
            tag: tag,
            attrs: attrsOf(el),
            rect: rect,
            visible: cs.visibility !== 'hidden',
            style: styleOf(el),
            ownText: null,
            range: null,
            isMask: isMask,
            occlusion: isMask ? [] : occlusion(el, rect),
            children: []
        };
        if (tag === 'input' && el.type === 'range') {
            const num = function(raw, fallback) {
                const v = parseFloat(raw);
                return isNaN(v) ? fallback : v;
            };
            const min = num(el.min, 0);
            const max = num(el.max, 100);
            node.range = { min: min, max: max, value: num(el.value, min) };
            return node;
        }
        if (isMask || ATOMIC.indexOf(tag) >= 0) return node;
        node.ownText = ownText(el);
        for (const child of Array.from(el.children)) {
            if (LC_SKIPPED.indexOf(child.tagName.toLowerCase()) >= 0) continue;
            if (child === maskEl) {
                const masked = describe(child, true);
                if (masked) node.children.push(masked);
                continue;
            }
            const described = describe(child, false);
            if (described) node.children.push(described);
        }
        return node;
    }

    const root = describe(rootEl, false);
    if (root && maskEl && !rootEl.contains(maskEl)) {
        const masked = describe(maskEl, true);
        if (masked) root.children.push(masked);
    }
    return JSON.stringify(root);
})()"#;

const PSEUDO_TEMPLATE: &str = r#"(function() {
    {{HELPERS}}
    const el = lcElementAt({{PATH}});
    if (!el) return JSON.stringify(null);
    const pseudo = {{PSEUDO}};
    const FIELDS = [
        ['width', 'width'], ['height', 'height'],
        ['backgroundColor', 'background-color'], ['backgroundImage', 'background-image'],
        ['background', 'background'], ['borderRadius', 'border-top-left-radius'],
        ['borderWidth', 'border-top-width'], ['borderColor', 'border-top-color'],
        ['boxShadow', 'box-shadow']
    ];
    const cs = getComputedStyle(el, pseudo);
    const computed = {};
    for (const f of FIELDS) {
        const v = cs.getPropertyValue(f[1]);
        if (v) computed[f[0]] = v.trim();
    }
    const authored = {};
    function visit(rules) {
        for (const rule of Array.from(rules)) {
            if (!rule.selectorText && rule.cssRules) {
                try { visit(rule.cssRules); } catch (e) {}
                continue;
            }
            if (!rule.selectorText || !rule.style) continue;
            for (const part of rule.selectorText.split(',')) {
                const sel = part.trim();
                if (sel.indexOf(pseudo) < 0) continue;
                const base = sel.split(pseudo).join('').trim() || '*';
                let matches = false;
                try { matches = el.matches(base); } catch (e) { matches = false; }
                if (!matches) continue;
                for (const f of FIELDS) {
                    const shorthand = f[1] === 'border-top-left-radius' ? 'border-radius'
                        : (f[1] === 'border-top-width' ? 'border-width'
                        : (f[1] === 'border-top-color' ? 'border-color' : f[1]));
                    const v = rule.style.getPropertyValue(shorthand);
                    if (v) authored[f[0]] = v.trim();
                }
            }
        }
    }
    for (const sheet of Array.from(document.styleSheets)) {
        try { visit(sheet.cssRules); } catch (e) {}
    }
    return JSON.stringify({
        controlRect: lcRect(el),
        computed: computed,
        authored: Object.keys(authored).length ? authored : null
    });
})()"#;

/// Computed properties captured for every element
pub const STYLE_PROPS: &[&str] = &[
    "display",
    "position",
    "z-index",
    "visibility",
    "background-color",
    "background-image",
    "border-top-width",
    "border-right-width",
    "border-bottom-width",
    "border-left-width",
    "border-top-color",
    "border-top-left-radius",
    "border-top-right-radius",
    "border-bottom-right-radius",
    "border-bottom-left-radius",
    "box-shadow",
    "filter",
    "clip-path",
    "mask-image",
    "-webkit-mask-image",
    "backdrop-filter",
    "-webkit-backdrop-filter",
    "mix-blend-mode",
    "overflow-x",
    "overflow-y",
    "opacity",
    "transform",
    "color",
    "font-family",
    "font-size",
    "font-weight",
    "font-style",
    "line-height",
    "letter-spacing",
    "text-align",
    "text-decoration-line",
    "text-transform",
    "white-space",
];

fn json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

pub fn stability(font_wait_ms: u64, settle_ms: u64) -> String {
    STABILITY_TEMPLATE
        .replace("{{FONT_WAIT_MS}}", &font_wait_ms.to_string())
        .replace("{{SETTLE_MS}}", &settle_ms.to_string())
}

pub fn probe(root_selector: Option<&str>) -> String {
    PROBE_TEMPLATE
        .replace("{{HELPERS}}", HELPERS)
        .replace("{{ROOT_SELECTOR}}", &json(&root_selector))
}

pub fn snapshot(root: &DomPath, mask: Option<&DomPath>, atomic_tags: &[&str]) -> String {
    SNAPSHOT_TEMPLATE
        .replace("{{HELPERS}}", HELPERS)
        .replace("{{ATOMIC_TAGS}}", &json(atomic_tags))
        .replace("{{STYLE_PROPS}}", &json(STYLE_PROPS))
        .replace("{{ROOT_PATH}}", &json(root))
        .replace("{{MASK_PATH}}", &json(&mask))
}

pub fn pseudo_style(element: &DomPath, pseudo: &str) -> String {
    PSEUDO_TEMPLATE
        .replace("{{HELPERS}}", HELPERS)
        .replace("{{PATH}}", &json(element))
        .replace("{{PSEUDO}}", &json(pseudo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_are_fully_substituted() {
        let scripts = [
            stability(3000, 100),
            probe(Some("#app")),
            probe(None),
            snapshot(&DomPath(vec![1, 0]), Some(&DomPath(vec![1, 4])), &["img"]),
            pseudo_style(&DomPath(vec![1, 2]), "::-webkit-slider-thumb"),
        ];
        for script in &scripts {
            assert!(!script.contains("{{"), "unsubstituted token in {script}");
        }
        assert!(scripts[1].contains(r##"const selector = "#app";"##));
        assert!(scripts[2].contains("const selector = null;"));
        assert!(scripts[3].contains("lcElementAt([1,0])"));
    }
}
