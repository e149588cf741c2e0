//! Native symbol names for managed methods.
//!
//! Two conventions are tried in order:
//!
//! - the *stub* convention, used by the runtime's own precompiled natives:
//!   `<prefix><class with '/' as '_'>_<method><postfix>`
//! - the JNI convention: `Java_<mangled class>_<mangled method>`, and its long
//!   form with `__<mangled signature>` appended to tell overloads apart.
//!
//! The JNI escape grammar is a stable contract with precompiled libraries:
//!
//! | input | output |
//! |-------|--------|
//! | `(`   | dropped |
//! | `)`   | ends the name |
//! | `_`   | `_1` |
//! | `;`   | `_2` |
//! | `[`   | `_3` |
//! | `/`   | `_` |

/// Appends the JNI-mangled form of `input` to `out`.
pub fn mangle_into(out: &mut String, input: &str) {
    for c in input.chars() {
        match c {
            '(' => {}
            ')' => break,
            '_' => out.push_str("_1"),
            ';' => out.push_str("_2"),
            '[' => out.push_str("_3"),
            '/' => out.push('_'),
            other => out.push(other),
        }
    }
}

/// JNI-mangled form of `input`.
///
/// ```
/// use jvm_native_bridge::mangle::mangle;
///
/// assert_eq!(mangle("java/lang/Object"), "java_lang_Object");
/// assert_eq!(mangle("(Ljava/lang/String;)V"), "Ljava_lang_String_2");
/// ```
pub fn mangle(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    mangle_into(&mut out, input);
    out
}

/// Prefixes and postfixes for the two naming conventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolNaming {
    pub stub_prefix: String,
    pub stub_postfix: String,
    pub jni_prefix: String,
}

impl Default for SymbolNaming {
    fn default() -> Self {
        SymbolNaming {
            stub_prefix: String::new(),
            stub_postfix: String::new(),
            jni_prefix: "Java_".to_string(),
        }
    }
}

impl SymbolNaming {
    /// Name under the runtime's stub convention.
    pub fn stub_name(&self, class: &str, method: &str) -> String {
        let mut name = String::with_capacity(
            self.stub_prefix.len() + class.len() + method.len() + self.stub_postfix.len() + 1,
        );
        name.push_str(&self.stub_prefix);
        name.extend(class.chars().map(|c| if c == '/' { '_' } else { c }));
        name.push('_');
        name.push_str(method);
        name.push_str(&self.stub_postfix);
        name
    }

    /// Short JNI name: `Java_<class>_<method>`.
    pub fn jni_short_name(&self, class: &str, method: &str) -> String {
        let mut name = self.jni_prefix.clone();
        mangle_into(&mut name, class);
        name.push('_');
        mangle_into(&mut name, method);
        name
    }

    /// Long JNI name: the short name followed by `__<signature>`.
    pub fn jni_long_name(&self, class: &str, method: &str, signature: &str) -> String {
        let mut name = self.jni_short_name(class, method);
        name.push_str("__");
        mangle_into(&mut name, signature);
        name
    }
}
