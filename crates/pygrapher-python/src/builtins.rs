//! Names of the Python 3 builtin scope.

use pygrapher_core::adapter::SymbolHandle;
use pygrapher_core::facts::SymbolKind;

const BUILTIN_FUNCTIONS: &[&str] = &[
    "__build_class__", "__import__", "abs", "aiter", "all", "anext", "any", "ascii", "bin",
    "breakpoint", "callable", "chr", "compile", "delattr", "dir", "divmod", "eval", "exec",
    "format", "getattr", "globals", "hasattr", "hash", "help", "hex", "id", "input",
    "isinstance", "issubclass", "iter", "len", "locals", "max", "min", "next", "oct", "open",
    "ord", "pow", "print", "repr", "round", "setattr", "sorted", "sum", "vars",
];

const BUILTIN_CLASSES: &[&str] = &[
    "bool", "bytearray", "bytes", "classmethod", "complex", "dict", "enumerate", "filter",
    "float", "frozenset", "int", "list", "map", "memoryview", "object", "property", "range",
    "reversed", "set", "slice", "staticmethod", "str", "super", "tuple", "type", "zip",
    // Exceptions
    "ArithmeticError", "AssertionError", "AttributeError", "BaseException",
    "BaseExceptionGroup", "BlockingIOError", "BrokenPipeError", "BufferError",
    "ChildProcessError", "ConnectionAbortedError", "ConnectionError",
    "ConnectionRefusedError", "ConnectionResetError", "EOFError", "EnvironmentError",
    "Exception", "ExceptionGroup", "FileExistsError", "FileNotFoundError",
    "FloatingPointError", "GeneratorExit", "IOError", "ImportError", "IndentationError",
    "IndexError", "InterruptedError", "IsADirectoryError", "KeyError", "KeyboardInterrupt",
    "LookupError", "MemoryError", "ModuleNotFoundError", "NameError", "NotADirectoryError",
    "NotImplementedError", "OSError", "OverflowError", "PermissionError",
    "ProcessLookupError", "RecursionError", "ReferenceError", "RuntimeError",
    "StopAsyncIteration", "StopIteration", "SyntaxError", "SystemError", "SystemExit",
    "TabError", "TimeoutError", "TypeError", "UnboundLocalError", "UnicodeDecodeError",
    "UnicodeEncodeError", "UnicodeError", "UnicodeTranslateError", "ValueError",
    "ZeroDivisionError",
    // Warnings
    "BytesWarning", "DeprecationWarning", "EncodingWarning", "FutureWarning", "ImportWarning",
    "PendingDeprecationWarning", "ResourceWarning", "RuntimeWarning", "SyntaxWarning",
    "UnicodeWarning", "UserWarning", "Warning",
];

const BUILTIN_CONSTANTS: &[&str] = &[
    "Ellipsis", "NotImplemented", "__debug__", "__doc__", "__file__", "__name__",
    "__package__", "__spec__", "copyright", "credits", "exit", "license", "quit",
];

/// Kind of a builtin name, or `None` if `name` is not a builtin.
pub fn builtin_kind(name: &str) -> Option<SymbolKind> {
    if BUILTIN_FUNCTIONS.contains(&name) {
        Some(SymbolKind::Function)
    } else if BUILTIN_CLASSES.contains(&name) {
        Some(SymbolKind::Class)
    } else if BUILTIN_CONSTANTS.contains(&name) {
        Some(SymbolKind::Instance)
    } else {
        None
    }
}

/// Handle for a builtin name, if it is one.
pub fn lookup_builtin(name: &str) -> Option<SymbolHandle> {
    builtin_kind(name).map(|kind| SymbolHandle::builtin(kind, name))
}
