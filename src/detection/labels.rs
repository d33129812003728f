//! 类别表 (Class label table)
//!
//! 模型旁边的 `classes.json`: 键为字符串形式的整数类别ID, 值为类别名.
//! 加载时完整校验, 运行期不会再出现解析错误.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassLabelTable {
    names: HashMap<u32, String>,
}

impl ClassLabelTable {
    /// 从JSON文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            PipelineError::ModelLoad(format!("cannot read class table {}: {}", path.display(), e))
        })?;
        let table = Self::from_json_str(&json).map_err(|e| match e {
            PipelineError::ModelLoad(msg) => {
                PipelineError::ModelLoad(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        log::info!("类别表已加载: {} ({} 类)", path.display(), table.len());
        Ok(table)
    }

    /// 解析 `{"1": "person", "3": "car", ...}`
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| PipelineError::ModelLoad(format!("malformed class table: {}", e)))?;

        let mut names = HashMap::with_capacity(raw.len());
        for (key, name) in raw {
            let id: u32 = key.trim().parse().map_err(|_| {
                PipelineError::ModelLoad(format!("class id '{}' is not a non-negative integer", key))
            })?;
            if name.trim().is_empty() {
                return Err(PipelineError::ModelLoad(format!(
                    "class id {} has an empty name",
                    id
                )));
            }
            if names.insert(id, name).is_some() {
                return Err(PipelineError::ModelLoad(format!("duplicate class id {}", id)));
            }
        }

        if names.is_empty() {
            return Err(PipelineError::ModelLoad("class table is empty".to_string()));
        }
        Ok(Self { names })
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        Self {
            names: pairs.into_iter().map(|(id, s)| (id, s.into())).collect(),
        }
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// 类别名 → ID (名字重复时取最小ID)
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.names
            .iter()
            .filter(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
            .min()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
