//! MSSCCI provider modules loaded with `libloading`.

use super::plugin::{
    BindError, PluginInfo, ProjectPathResult, QueryResult, SCC_EXCAP_THREADSAFE_QUERY_INFO,
    SccApi,
};
use crate::models::{ProjectContext, SccCaps, SccCode, WindowHandle};
use camino::{Utf8Path, Utf8PathBuf};
use libloading::{Library, Symbol};
use std::ffi::{CStr, CString, c_char, c_void};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

const SCC_NAME_LEN: usize = 31;
const SCC_AUXLABEL_LEN: usize = 31;
const SCC_USER_LEN: usize = 31;
const SCC_PRJPATH_LEN: usize = 300;
const SCC_MAX_PATH: usize = 260;

type Context = *mut c_void;
type Hwnd = *mut c_void;
type Names = *const *const c_char;
type TextOutProc = Option<unsafe extern "C" fn(*const c_char, i32) -> i32>;

type SccInitializeFn = unsafe extern "C" fn(
    *mut Context,
    Hwnd,
    *const c_char,
    *mut c_char,
    *mut i32,
    *mut c_char,
    *mut i32,
    *mut i32,
) -> i32;
type SccUninitializeFn = unsafe extern "C" fn(Context) -> i32;
type SccOpenProjectFn = unsafe extern "C" fn(
    Context,
    Hwnd,
    *mut c_char,
    *const c_char,
    *const c_char,
    *mut c_char,
    *const c_char,
    TextOutProc,
    i32,
) -> i32;
type SccCloseProjectFn = unsafe extern "C" fn(Context) -> i32;
type SccGetProjPathFn = unsafe extern "C" fn(
    Context,
    Hwnd,
    *mut c_char,
    *mut c_char,
    *mut c_char,
    *mut c_char,
    i32,
    *mut i32,
) -> i32;
type SccCheckoutFn =
    unsafe extern "C" fn(Context, Hwnd, i32, Names, *const c_char, i32, *mut c_void) -> i32;
type SccUncheckoutFn = unsafe extern "C" fn(Context, Hwnd, i32, Names, i32, *mut c_void) -> i32;
type SccCheckinFn =
    unsafe extern "C" fn(Context, Hwnd, i32, Names, *const c_char, i32, *mut c_void) -> i32;
type SccAddFn =
    unsafe extern "C" fn(Context, Hwnd, i32, Names, *const c_char, *mut i32, *mut c_void) -> i32;
type SccRemoveFn =
    unsafe extern "C" fn(Context, Hwnd, i32, Names, *const c_char, i32, *mut c_void) -> i32;
type SccDiffFn = unsafe extern "C" fn(Context, Hwnd, *const c_char, i32, *mut c_void) -> i32;
type SccHistoryFn = unsafe extern "C" fn(Context, Hwnd, i32, Names, i32, *mut c_void) -> i32;
type SccPropertiesFn = unsafe extern "C" fn(Context, Hwnd, *const c_char) -> i32;
type SccQueryInfoFn = unsafe extern "C" fn(Context, i32, Names, *mut i32) -> i32;
type SccGetExtendedCapabilitiesFn = unsafe extern "C" fn(Context, i32, *mut i32) -> i32;

/// Resolved provider entry points. The optional ones are not implemented
/// by every provider.
struct EntryPoints {
    initialize: SccInitializeFn,
    uninitialize: SccUninitializeFn,
    open_project: SccOpenProjectFn,
    close_project: SccCloseProjectFn,
    get_proj_path: SccGetProjPathFn,
    checkout: SccCheckoutFn,
    uncheckout: SccUncheckoutFn,
    checkin: SccCheckinFn,
    add: SccAddFn,
    remove: SccRemoveFn,
    diff: SccDiffFn,
    history: SccHistoryFn,
    query_info: SccQueryInfoFn,
    properties: Option<SccPropertiesFn>,
    get_extended_capabilities: Option<SccGetExtendedCapabilitiesFn>,
}

/// A loaded provider module.
///
/// The module is unloaded when this value is dropped, which the dispatcher
/// only lets happen on its worker thread.
pub struct NativePlugin {
    entry: EntryPoints,
    context: AtomicPtr<c_void>,
    path: Utf8PathBuf,
    _library: Library,
}

impl NativePlugin {
    /// Load the module at `path` and resolve its entry points.
    pub fn load(path: &Utf8Path) -> Result<Self, BindError> {
        tracing::info!("Loading source control provider module {}", path);

        let library = unsafe { Library::new(path.as_std_path()) }.map_err(|source| {
            BindError::Load {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let entry = EntryPoints {
            initialize: required(&library, path, "SccInitialize")?,
            uninitialize: required(&library, path, "SccUninitialize")?,
            open_project: required(&library, path, "SccOpenProject")?,
            close_project: required(&library, path, "SccCloseProject")?,
            get_proj_path: required(&library, path, "SccGetProjPath")?,
            checkout: required(&library, path, "SccCheckout")?,
            uncheckout: required(&library, path, "SccUncheckout")?,
            checkin: required(&library, path, "SccCheckin")?,
            add: required(&library, path, "SccAdd")?,
            remove: required(&library, path, "SccRemove")?,
            diff: required(&library, path, "SccDiff")?,
            history: required(&library, path, "SccHistory")?,
            query_info: required(&library, path, "SccQueryInfo")?,
            properties: optional(&library, "SccProperties"),
            get_extended_capabilities: optional(&library, "SccGetExtendedCapabilities"),
        };

        Ok(Self {
            entry,
            context: AtomicPtr::new(ptr::null_mut()),
            path: path.to_path_buf(),
            _library: library,
        })
    }

    fn context(&self) -> Context {
        self.context.load(Ordering::Acquire)
    }
}

fn required<T: Copy>(library: &Library, path: &Utf8Path, symbol: &'static str) -> Result<T, BindError> {
    optional(library, symbol).ok_or_else(|| BindError::MissingEntryPoint {
        path: path.to_path_buf(),
        symbol,
    })
}

fn optional<T: Copy>(library: &Library, symbol: &'static str) -> Option<T> {
    let name = format!("{}\0", symbol);
    let resolved: Result<Symbol<T>, _> = unsafe { library.get(name.as_bytes()) };
    match resolved {
        Ok(function) => Some(*function),
        Err(_) => {
            tracing::debug!("Provider does not export {}", symbol);
            None
        }
    }
}

/// Null terminated copies of a file list, kept alive for one call.
struct FileNames {
    _owned: Vec<CString>,
    pointers: Vec<*const c_char>,
}

impl FileNames {
    fn new(files: &[String]) -> Option<Self> {
        let owned = files
            .iter()
            .map(|file| CString::new(file.as_str()).ok())
            .collect::<Option<Vec<_>>>()?;
        let pointers = owned.iter().map(|name| name.as_ptr()).collect();
        Some(Self {
            _owned: owned,
            pointers,
        })
    }

    fn count(&self) -> i32 {
        self.pointers.len() as i32
    }

    fn as_ptr(&self) -> Names {
        self.pointers.as_ptr()
    }
}

/// Ask the provider whether it supports one `SCC_EXCAP_*` capability.
fn extended_capability(
    query: SccGetExtendedCapabilitiesFn,
    context: Context,
    capability: i32,
) -> bool {
    let mut supported = 0i32;
    let code = unsafe { query(context, capability, &mut supported) };
    code >= 0 && supported != 0
}

/// Fixed size in/out string buffer.
fn buffer(initial: &str, len: usize) -> Vec<c_char> {
    let mut buf = vec![0 as c_char; len + 1];
    for (slot, byte) in buf.iter_mut().zip(initial.bytes().take(len)) {
        *slot = byte as c_char;
    }
    buf
}

fn from_buffer(buf: &mut [c_char]) -> String {
    if let Some(last) = buf.last_mut() {
        *last = 0;
    }
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

impl SccApi for NativePlugin {
    fn initialize(&self, window: WindowHandle, caller_name: &str) -> PluginInfo {
        let Ok(caller) = CString::new(caller_name) else {
            return PluginInfo {
                code: SccCode::INITIALIZE_FAILED,
                ..PluginInfo::default()
            };
        };

        let mut context: Context = ptr::null_mut();
        let mut name = buffer("", SCC_NAME_LEN);
        let mut aux_label = buffer("", SCC_AUXLABEL_LEN);
        let mut caps = 0i32;
        let mut checkout_comment_len = 0i32;
        let mut comment_len = 0i32;

        let code = unsafe {
            (self.entry.initialize)(
                &mut context,
                window.as_ptr(),
                caller.as_ptr(),
                name.as_mut_ptr(),
                &mut caps,
                aux_label.as_mut_ptr(),
                &mut checkout_comment_len,
                &mut comment_len,
            )
        };
        self.context.store(context, Ordering::Release);

        PluginInfo {
            code: SccCode(code),
            provider_name: from_buffer(&mut name),
            capabilities: SccCaps::from_raw(caps),
            aux_path_label: from_buffer(&mut aux_label),
            checkout_comment_len,
            comment_len,
            threadsafe_query_info: false,
        }
    }

    fn uninitialize(&self) -> SccCode {
        let context = self.context.swap(ptr::null_mut(), Ordering::AcqRel);
        SccCode(unsafe { (self.entry.uninitialize)(context) })
    }

    fn threadsafe_query_info(&self) -> bool {
        self.entry.get_extended_capabilities.is_some_and(|query| {
            extended_capability(query, self.context(), SCC_EXCAP_THREADSAFE_QUERY_INFO)
        })
    }

    fn open_project(
        &self,
        window: WindowHandle,
        project: &ProjectContext,
        comment: &str,
        flags: i32,
    ) -> SccCode {
        let (Ok(project_name), Ok(local_path), Ok(comment)) = (
            CString::new(project.project_name.as_str()),
            CString::new(project.local_path.as_str()),
            CString::new(comment),
        ) else {
            return SccCode::INVALID_FILE_PATH;
        };
        let mut user = buffer(&project.user, SCC_USER_LEN);
        let mut aux_path = buffer(&project.aux_project_path, SCC_PRJPATH_LEN);

        SccCode(unsafe {
            (self.entry.open_project)(
                self.context(),
                window.as_ptr(),
                user.as_mut_ptr(),
                project_name.as_ptr(),
                local_path.as_ptr(),
                aux_path.as_mut_ptr(),
                comment.as_ptr(),
                None,
                flags,
            )
        })
    }

    fn close_project(&self) -> SccCode {
        SccCode(unsafe { (self.entry.close_project)(self.context()) })
    }

    fn get_project_path(
        &self,
        window: WindowHandle,
        project: &ProjectContext,
        allow_change_path: bool,
    ) -> ProjectPathResult {
        let mut user = buffer(&project.user, SCC_USER_LEN);
        let mut project_name = buffer(&project.project_name, SCC_PRJPATH_LEN);
        let mut local_path = buffer(&project.local_path, SCC_MAX_PATH);
        let mut aux_path = buffer(&project.aux_project_path, SCC_PRJPATH_LEN);
        let mut is_new = 0i32;

        let code = unsafe {
            (self.entry.get_proj_path)(
                self.context(),
                window.as_ptr(),
                user.as_mut_ptr(),
                project_name.as_mut_ptr(),
                local_path.as_mut_ptr(),
                aux_path.as_mut_ptr(),
                i32::from(allow_change_path),
                &mut is_new,
            )
        };

        ProjectPathResult {
            code: SccCode(code),
            project: ProjectContext {
                user: from_buffer(&mut user),
                project_name: from_buffer(&mut project_name),
                local_path: from_buffer(&mut local_path),
                aux_project_path: from_buffer(&mut aux_path),
            },
            is_new: is_new != 0,
        }
    }

    fn checkout(&self, window: WindowHandle, files: &[String], comment: &str) -> SccCode {
        let (Some(names), Ok(comment)) = (FileNames::new(files), CString::new(comment)) else {
            return SccCode::INVALID_FILE_PATH;
        };
        SccCode(unsafe {
            (self.entry.checkout)(
                self.context(),
                window.as_ptr(),
                names.count(),
                names.as_ptr(),
                comment.as_ptr(),
                0,
                ptr::null_mut(),
            )
        })
    }

    fn uncheckout(&self, window: WindowHandle, files: &[String]) -> SccCode {
        let Some(names) = FileNames::new(files) else {
            return SccCode::INVALID_FILE_PATH;
        };
        SccCode(unsafe {
            (self.entry.uncheckout)(
                self.context(),
                window.as_ptr(),
                names.count(),
                names.as_ptr(),
                0,
                ptr::null_mut(),
            )
        })
    }

    fn checkin(&self, window: WindowHandle, files: &[String], comment: &str, flags: i32) -> SccCode {
        let (Some(names), Ok(comment)) = (FileNames::new(files), CString::new(comment)) else {
            return SccCode::INVALID_FILE_PATH;
        };
        SccCode(unsafe {
            (self.entry.checkin)(
                self.context(),
                window.as_ptr(),
                names.count(),
                names.as_ptr(),
                comment.as_ptr(),
                flags,
                ptr::null_mut(),
            )
        })
    }

    fn add(&self, window: WindowHandle, files: &[String], comment: &str) -> SccCode {
        let (Some(names), Ok(comment)) = (FileNames::new(files), CString::new(comment)) else {
            return SccCode::INVALID_FILE_PATH;
        };
        // SCC_FILETYPE_AUTO for every file
        let mut options = vec![0i32; files.len()];
        SccCode(unsafe {
            (self.entry.add)(
                self.context(),
                window.as_ptr(),
                names.count(),
                names.as_ptr(),
                comment.as_ptr(),
                options.as_mut_ptr(),
                ptr::null_mut(),
            )
        })
    }

    fn remove(&self, window: WindowHandle, files: &[String], comment: &str) -> SccCode {
        let (Some(names), Ok(comment)) = (FileNames::new(files), CString::new(comment)) else {
            return SccCode::INVALID_FILE_PATH;
        };
        SccCode(unsafe {
            (self.entry.remove)(
                self.context(),
                window.as_ptr(),
                names.count(),
                names.as_ptr(),
                comment.as_ptr(),
                0,
                ptr::null_mut(),
            )
        })
    }

    fn diff(&self, window: WindowHandle, file: &str) -> SccCode {
        let Ok(file) = CString::new(file) else {
            return SccCode::INVALID_FILE_PATH;
        };
        SccCode(unsafe {
            (self.entry.diff)(
                self.context(),
                window.as_ptr(),
                file.as_ptr(),
                0,
                ptr::null_mut(),
            )
        })
    }

    fn history(&self, window: WindowHandle, files: &[String]) -> SccCode {
        let Some(names) = FileNames::new(files) else {
            return SccCode::INVALID_FILE_PATH;
        };
        SccCode(unsafe {
            (self.entry.history)(
                self.context(),
                window.as_ptr(),
                names.count(),
                names.as_ptr(),
                0,
                ptr::null_mut(),
            )
        })
    }

    fn properties(&self, window: WindowHandle, file: &str) -> SccCode {
        let Some(properties) = self.entry.properties else {
            return SccCode::OP_NOT_SUPPORTED;
        };
        let Ok(file) = CString::new(file) else {
            return SccCode::INVALID_FILE_PATH;
        };
        SccCode(unsafe { properties(self.context(), window.as_ptr(), file.as_ptr()) })
    }

    fn query_info(&self, files: &[String]) -> QueryResult {
        let Some(names) = FileNames::new(files) else {
            return QueryResult {
                code: SccCode::INVALID_FILE_PATH,
                raw: Vec::new(),
            };
        };
        let mut raw = vec![0i32; files.len()];
        let code = unsafe {
            (self.entry.query_info)(self.context(), names.count(), names.as_ptr(), raw.as_mut_ptr())
        };
        QueryResult {
            code: SccCode(code),
            raw,
        }
    }
}

impl Drop for NativePlugin {
    fn drop(&mut self) {
        tracing::info!("Unloading source control provider module {}", self.path);
    }
}
