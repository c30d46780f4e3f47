/// One lookup to benchmark against a [`RouteTable`].
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    path: &'static str,
}

impl TestCase {
    pub const fn new(name: &'static str, group: TestGroup, path: &'static str) -> Self {
        Self { name, group, path }
    }

    pub const fn static_route(name: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Static, path)
    }

    pub const fn param_route(name: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Param, path)
    }

    pub const fn catch_all_route(name: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::CatchAll, path)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn path(&self) -> &'static str {
        self.path
    }
}

/// Route patterns registered before a benchmark runs.
#[derive(Debug, Copy, Clone)]
pub struct RouteTable {
    name: &'static str,
    patterns: &'static [&'static str],
}

impl RouteTable {
    pub const fn new(name: &'static str, patterns: &'static [&'static str]) -> Self {
        Self { name, patterns }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn patterns(&self) -> &'static [&'static str] {
        self.patterns
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Static,
    Param,
    CatchAll,
}
