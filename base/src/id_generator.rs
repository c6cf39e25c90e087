use crate::error::FlowdeskError;
use anyhow::Result;
use snowflake::SnowflakeIdGenerator;

pub enum IDGenerator {
    Snowflake(SnowflakeIdGenerator),
    Mock(MockIdGenerator),
}

impl IDGenerator {
    pub fn generate(&mut self) -> Result<i64> {
        match self {
            IDGenerator::Snowflake(g) => {
                let id = g.real_time_generate();
                if id <= 0 {
                    Err(FlowdeskError::GenerateIdError(format!("invalid id generated: {id}")).into())
                } else {
                    Ok(id)
                }
            }
            IDGenerator::Mock(g) => Ok(g.generate()),
        }
    }
}

// sequential ids for tests
pub struct MockIdGenerator {
    current: i64,
}

impl MockIdGenerator {
    pub fn new() -> Self {
        MockIdGenerator { current: 0 }
    }
    pub fn generate(&mut self) -> i64 {
        self.current += 1;
        self.current
    }
}

impl Default for MockIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// machine and node ids are 5 bit values in the snowflake layout.
pub fn new_generator(machine_id: i32, node_id: i32) -> IDGenerator {
    IDGenerator::Snowflake(SnowflakeIdGenerator::new(machine_id & 0x1f, node_id & 0x1f))
}
